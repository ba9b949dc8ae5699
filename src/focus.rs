//! Focus router.
//!
//! While at least one embedded editor is registered, the router wraps two
//! host control points:
//! - command dispatch, so recognized editor commands run against the focused
//!   embedded editor instead of the host's own target;
//! - active-view lookup, so the focused embedded editor is reported as the
//!   active view of its kind.
//!
//! The host's original hooks are kept as data and put back when the last
//! embed unregisters, leaving the host exactly as it was. Sessions dropped
//! without unregistering are pruned on the next routed call, and the hooks
//! come off at the next focus event (or [`FocusRouter::sweep`]) once none
//! are left.

use crate::commands::EditorCommand;
use crate::config::EditingConfig;
use crate::session::SectionSession;
use crate::surface::{EditingSurface, SurfaceId, ViewKind};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Command dispatch control point. Returns whether the command was handled.
pub type DispatchHook = Rc<dyn Fn(&str) -> bool>;

/// Active-view-of-kind control point.
pub type ActiveViewHook = Rc<dyn Fn(&ViewKind) -> Option<ActiveView>>;

/// An element in the host's view tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveView {
    /// A view owned by the host.
    Host(u64),
    /// An embedded section editor.
    Embedded(SurfaceId),
}

/// Replaceable host control points.
pub trait HostControls {
    fn dispatch_hook(&self) -> DispatchHook;

    fn set_dispatch_hook(&self, hook: DispatchHook);

    fn active_view_hook(&self) -> ActiveViewHook;

    fn set_active_view_hook(&self, hook: ActiveViewHook);
}

/// Something that owns an editing surface the router can redirect to.
pub trait SurfaceProvider {
    fn editor(&self) -> Option<&dyn EditingSurface>;

    fn editor_mut(&mut self) -> Option<&mut dyn EditingSurface>;
}

impl<E: EditingSurface> SurfaceProvider for SectionSession<E> {
    fn editor(&self) -> Option<&dyn EditingSurface> {
        self.surface().map(|s| s as &dyn EditingSurface)
    }

    fn editor_mut(&mut self) -> Option<&mut dyn EditingSurface> {
        self.surface_mut().map(|s| s as &mut dyn EditingSurface)
    }
}

struct Registration {
    container: ElementId,
    session: Weak<RefCell<dyn SurfaceProvider>>,
}

struct Originals {
    dispatch: DispatchHook,
    active_view: ActiveViewHook,
}

struct RouterState {
    host: Rc<dyn HostControls>,
    config: EditingConfig,
    sessions: Vec<Registration>,
    focused: Option<ElementId>,
    originals: Option<Originals>,
}

impl RouterState {
    fn is_registered(&self, element: ElementId) -> bool {
        self.sessions.iter().any(|r| r.container == element)
    }

    fn focused_session(&self) -> Option<Rc<RefCell<dyn SurfaceProvider>>> {
        let focused = self.focused?;
        self.sessions
            .iter()
            .find(|r| r.container == focused)
            .and_then(|r| r.session.upgrade())
    }

    fn prune(&mut self) {
        self.sessions.retain(|r| r.session.strong_count() > 0);
        if self.focused.is_some_and(|f| !self.is_registered(f)) {
            self.focused = None;
        }
    }
}

/// Run `id` against the focused session, if it names a recognized command.
fn route_command(state: &Rc<RefCell<RouterState>>, id: &str) -> bool {
    let Some(command) = EditorCommand::from_id(id) else {
        return false;
    };
    let (session, config) = {
        let mut state = state.borrow_mut();
        state.prune();
        match state.focused_session() {
            Some(session) => (session, state.config.clone()),
            None => return false,
        }
    };

    let Ok(mut session) = session.try_borrow_mut() else {
        return false;
    };
    match session.editor_mut() {
        Some(surface) => {
            command.execute(surface, &config);
            true
        }
        None => false,
    }
}

fn route_active_view(state: &Rc<RefCell<RouterState>>, kind: &ViewKind) -> Option<ActiveView> {
    let session = {
        let mut state = state.borrow_mut();
        state.prune();
        state.focused_session()?
    };
    let session = session.try_borrow().ok()?;
    let surface = session.editor()?;
    (surface.kind() == *kind).then(|| ActiveView::Embedded(surface.id()))
}

/// Routes host commands and view lookups to the focused embedded editor.
#[derive(Clone)]
pub struct FocusRouter {
    state: Rc<RefCell<RouterState>>,
}

impl FocusRouter {
    pub fn new(host: Rc<dyn HostControls>, config: EditingConfig) -> Self {
        Self {
            state: Rc::new(RefCell::new(RouterState {
                host,
                config,
                sessions: Vec::new(),
                focused: None,
                originals: None,
            })),
        }
    }

    /// Register the embed rendered in `container`. The first registration
    /// installs the interceptions.
    pub fn register<S>(&self, container: ElementId, session: &Rc<RefCell<S>>)
    where
        S: SurfaceProvider + 'static,
    {
        let session: Rc<RefCell<dyn SurfaceProvider>> = session.clone();
        {
            let mut state = self.state.borrow_mut();
            state.prune();
            state.sessions.retain(|r| r.container != container);
            state.sessions.push(Registration {
                container,
                session: Rc::downgrade(&session),
            });
            tracing::debug!(container = container.0, sessions = state.sessions.len(), "registered embed");
        }
        self.install();
    }

    /// Remove the embed rendered in `container`. The last removal restores the
    /// host's original hooks.
    pub fn unregister(&self, container: ElementId) {
        let empty = {
            let mut state = self.state.borrow_mut();
            state.sessions.retain(|r| r.container != container);
            state.prune();
            tracing::debug!(container = container.0, sessions = state.sessions.len(), "unregistered embed");
            state.sessions.is_empty()
        };
        if empty {
            self.uninstall();
        }
    }

    fn install(&self) {
        let mut state = self.state.borrow_mut();
        if state.originals.is_some() {
            return;
        }
        let originals = Originals {
            dispatch: state.host.dispatch_hook(),
            active_view: state.host.active_view_hook(),
        };

        let weak = Rc::downgrade(&self.state);
        let fallback = Rc::clone(&originals.dispatch);
        let dispatch: DispatchHook = Rc::new(move |id: &str| {
            if weak.upgrade().is_some_and(|state| route_command(&state, id)) {
                return true;
            }
            fallback(id)
        });

        let weak = Rc::downgrade(&self.state);
        let fallback = Rc::clone(&originals.active_view);
        let active_view: ActiveViewHook = Rc::new(move |kind: &ViewKind| {
            weak.upgrade()
                .and_then(|state| route_active_view(&state, kind))
                .or_else(|| fallback(kind))
        });

        state.host.set_dispatch_hook(dispatch);
        state.host.set_active_view_hook(active_view);
        state.originals = Some(originals);
        tracing::debug!("installed focus router");
    }

    fn uninstall(&self) {
        let mut state = self.state.borrow_mut();
        let Some(originals) = state.originals.take() else {
            return;
        };
        state.host.set_dispatch_hook(originals.dispatch);
        state.host.set_active_view_hook(originals.active_view);
        state.focused = None;
        tracing::debug!("uninstalled focus router");
    }

    /// Drop registrations whose session is gone, restoring the host's hooks
    /// when none remain.
    pub fn sweep(&self) {
        let empty = {
            let mut state = self.state.borrow_mut();
            state.prune();
            state.sessions.is_empty()
        };
        if empty {
            self.uninstall();
        }
    }

    /// Focus moved into the element whose ancestor chain (nearest first) is
    /// `path`.
    pub fn focus_in(&self, path: &[ElementId]) {
        self.sweep();
        let mut state = self.state.borrow_mut();
        if let Some(container) = path.iter().copied().find(|e| state.is_registered(*e)) {
            if state.focused != Some(container) {
                tracing::debug!(container = container.0, "embed focused");
            }
            state.focused = Some(container);
        }
    }

    /// Focus left an element. `related` is the ancestor chain of the element
    /// receiving focus, if any.
    pub fn focus_out(&self, related: Option<&[ElementId]>) {
        self.sweep();
        let mut state = self.state.borrow_mut();
        let stays_in_embed =
            related.is_some_and(|path| path.iter().any(|e| state.is_registered(*e)));
        if !stays_in_embed && state.focused.take().is_some() {
            tracing::debug!("embed focus cleared");
        }
    }

    pub fn focused(&self) -> Option<ElementId> {
        self.state.borrow().focused
    }

    /// Container of the registered embed that owns `surface`.
    pub fn container_of(&self, surface: SurfaceId) -> Option<ElementId> {
        let state = self.state.borrow();
        state.sessions.iter().find_map(|r| {
            let session = r.session.upgrade()?;
            let session = session.try_borrow().ok()?;
            let owned = session.editor().is_some_and(|s| s.id() == surface);
            owned.then_some(r.container)
        })
    }

    pub fn is_installed(&self) -> bool {
        self.state.borrow().originals.is_some()
    }

    pub fn session_count(&self) -> usize {
        self.state.borrow().sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use crate::store::{DocumentHandle, MemoryStore};
    use crate::surface::{BufferSurface, Position};
    use std::time::Instant;

    struct FakeHost {
        dispatch: RefCell<DispatchHook>,
        active_view: RefCell<ActiveViewHook>,
        handled: Rc<RefCell<Vec<String>>>,
    }

    impl FakeHost {
        fn new() -> Rc<Self> {
            let handled = Rc::new(RefCell::new(Vec::new()));
            let log = Rc::clone(&handled);
            Rc::new(Self {
                dispatch: RefCell::new(Rc::new(move |id: &str| {
                    log.borrow_mut().push(id.to_string());
                    true
                })),
                active_view: RefCell::new(Rc::new(|_: &ViewKind| Some(ActiveView::Host(7)))),
                handled,
            })
        }

        fn dispatch(&self, id: &str) -> bool {
            let hook = self.dispatch_hook();
            hook(id)
        }

        fn active_view(&self, kind: &ViewKind) -> Option<ActiveView> {
            let hook = self.active_view_hook();
            hook(kind)
        }
    }

    impl HostControls for FakeHost {
        fn dispatch_hook(&self) -> DispatchHook {
            self.dispatch.borrow().clone()
        }

        fn set_dispatch_hook(&self, hook: DispatchHook) {
            *self.dispatch.borrow_mut() = hook;
        }

        fn active_view_hook(&self) -> ActiveViewHook {
            self.active_view.borrow().clone()
        }

        fn set_active_view_hook(&self, hook: ActiveViewHook) {
            *self.active_view.borrow_mut() = hook;
        }
    }

    type Session = Rc<RefCell<SectionSession<BufferSurface>>>;

    fn session(store: &Rc<MemoryStore>, name: &str, body: &str) -> Session {
        let doc = DocumentHandle::new(format!("{name}.md"));
        store.insert(&doc, format!("# {name}\n{body}"));
        let session =
            SectionSession::open(doc, name, store.clone(), BufferSurface::new(), &SyncConfig::default())
                .unwrap();
        Rc::new(RefCell::new(session))
    }

    fn setup() -> (Rc<FakeHost>, FocusRouter) {
        let host = FakeHost::new();
        let router = FocusRouter::new(host.clone(), EditingConfig::default());
        (host, router)
    }

    const Y: ElementId = ElementId(10);
    const Z: ElementId = ElementId(20);
    const Y_EDITOR: ElementId = ElementId(11);
    const Z_EDITOR: ElementId = ElementId(21);
    const ROOT: ElementId = ElementId(1);
    const SIDEBAR: ElementId = ElementId(2);

    #[test]
    fn test_install_and_exact_restore() {
        let (host, router) = setup();
        let store = Rc::new(MemoryStore::new());
        let original_dispatch = host.dispatch_hook();
        let original_view = host.active_view_hook();

        let y = session(&store, "Y", "a");
        let z = session(&store, "Z", "b");
        router.register(Y, &y);
        assert!(router.is_installed());
        assert!(!Rc::ptr_eq(&host.dispatch_hook(), &original_dispatch));
        router.register(Z, &z);

        router.unregister(Y);
        assert!(router.is_installed());
        router.unregister(Z);
        assert!(!router.is_installed());
        assert!(Rc::ptr_eq(&host.dispatch_hook(), &original_dispatch));
        assert!(Rc::ptr_eq(&host.active_view_hook(), &original_view));

        router.unregister(Z);
        assert!(Rc::ptr_eq(&host.dispatch_hook(), &original_dispatch));
    }

    #[test]
    fn test_checklist_command_goes_to_focused_session() {
        let (host, router) = setup();
        let store = Rc::new(MemoryStore::new());
        let y = session(&store, "Y", "buy milk");
        router.register(Y, &y);
        y.borrow_mut()
            .surface_mut()
            .unwrap()
            .set_cursor(Position::new(1, 0));

        router.focus_in(&[Y_EDITOR, Y, ROOT]);
        assert_eq!(router.focused(), Some(Y));

        assert!(host.dispatch("editor:toggle-checklist-status"));
        assert_eq!(y.borrow().surface().unwrap().text(), "# Y\n- [ ] buy milk");
        assert!(host.dispatch("editor:toggle-checklist-status"));
        assert_eq!(y.borrow().surface().unwrap().text(), "# Y\n- [x] buy milk");
        assert!(host.handled.borrow().is_empty());

        y.borrow_mut().poll(Instant::now());
        assert_eq!(
            store.get(&DocumentHandle::new("Y.md")).unwrap(),
            "# Y\n- [x] buy milk"
        );
    }

    #[test]
    fn test_unrecognized_command_falls_through() {
        let (host, router) = setup();
        let store = Rc::new(MemoryStore::new());
        let y = session(&store, "Y", "text");
        router.register(Y, &y);
        router.focus_in(&[Y]);

        assert!(host.dispatch("app:open-settings"));
        assert_eq!(*host.handled.borrow(), vec!["app:open-settings"]);
        assert_eq!(y.borrow().surface().unwrap().text(), "# Y\ntext");
    }

    #[test]
    fn test_focus_out_to_non_embed_clears_and_falls_through() {
        let (host, router) = setup();
        let store = Rc::new(MemoryStore::new());
        let y = session(&store, "Y", "one");
        let z = session(&store, "Z", "two");
        router.register(Y, &y);
        router.register(Z, &z);

        router.focus_in(&[Z_EDITOR, Z, ROOT]);
        assert_eq!(router.focused(), Some(Z));
        router.focus_out(Some(&[SIDEBAR, ROOT]));
        assert_eq!(router.focused(), None);

        host.dispatch("editor:toggle-bold");
        assert_eq!(*host.handled.borrow(), vec!["editor:toggle-bold"]);
        assert_eq!(z.borrow().surface().unwrap().text(), "# Z\ntwo");
    }

    #[test]
    fn test_focus_transfer_between_embeds() {
        let (_host, router) = setup();
        let store = Rc::new(MemoryStore::new());
        let y = session(&store, "Y", "one");
        let z = session(&store, "Z", "two");
        router.register(Y, &y);
        router.register(Z, &z);

        router.focus_in(&[Y_EDITOR, Y]);
        router.focus_out(Some(&[Z_EDITOR, Z]));
        assert_eq!(router.focused(), Some(Y));
        router.focus_in(&[Z_EDITOR, Z]);
        assert_eq!(router.focused(), Some(Z));

        // Opposite event order.
        router.focus_in(&[Y_EDITOR, Y]);
        router.focus_out(Some(&[Y_EDITOR, Y]));
        assert_eq!(router.focused(), Some(Y));
    }

    #[test]
    fn test_focus_in_outside_embeds_keeps_state() {
        let (_host, router) = setup();
        let store = Rc::new(MemoryStore::new());
        let y = session(&store, "Y", "one");
        router.register(Y, &y);
        router.focus_in(&[SIDEBAR, ROOT]);
        assert_eq!(router.focused(), None);
    }

    #[test]
    fn test_active_view_returns_focused_surface() {
        let (host, router) = setup();
        let store = Rc::new(MemoryStore::new());
        let y = session(&store, "Y", "one");
        let id = y.borrow().surface().unwrap().id();
        router.register(Y, &y);

        assert_eq!(host.active_view(&ViewKind::Markdown), Some(ActiveView::Host(7)));
        router.focus_in(&[Y]);
        assert_eq!(
            host.active_view(&ViewKind::Markdown),
            Some(ActiveView::Embedded(id))
        );
        assert_eq!(
            host.active_view(&ViewKind::Other("canvas".into())),
            Some(ActiveView::Host(7))
        );
        assert_eq!(router.container_of(id), Some(Y));
    }

    #[test]
    fn test_dropped_session_falls_through() {
        let (host, router) = setup();
        let store = Rc::new(MemoryStore::new());
        let y = session(&store, "Y", "one");
        router.register(Y, &y);
        router.focus_in(&[Y]);
        drop(y);

        host.dispatch("editor:delete-line");
        assert_eq!(*host.handled.borrow(), vec!["editor:delete-line"]);
        assert_eq!(router.session_count(), 0);
        assert_eq!(router.focused(), None);
    }

    #[test]
    fn test_dropped_sessions_release_host_hooks() {
        let (host, router) = setup();
        let store = Rc::new(MemoryStore::new());
        let original_dispatch = host.dispatch_hook();
        let original_view = host.active_view_hook();

        let y = session(&store, "Y", "one");
        let z = session(&store, "Z", "two");
        router.register(Y, &y);
        router.register(Z, &z);
        router.focus_in(&[Y]);
        drop(y);

        router.focus_out(Some(&[SIDEBAR]));
        assert!(router.is_installed());
        assert_eq!(router.session_count(), 1);

        drop(z);
        router.focus_in(&[SIDEBAR, ROOT]);
        assert!(!router.is_installed());
        assert!(Rc::ptr_eq(&host.dispatch_hook(), &original_dispatch));
        assert!(Rc::ptr_eq(&host.active_view_hook(), &original_view));
    }

    #[test]
    fn test_unregister_focused_clears_focus() {
        let (_host, router) = setup();
        let store = Rc::new(MemoryStore::new());
        let y = session(&store, "Y", "one");
        let z = session(&store, "Z", "two");
        router.register(Y, &y);
        router.register(Z, &z);
        router.focus_in(&[Y]);

        router.unregister(Y);
        assert_eq!(router.focused(), None);
        assert_eq!(router.session_count(), 1);
    }

    #[test]
    fn test_torn_down_session_is_not_targeted() {
        let (host, router) = setup();
        let store = Rc::new(MemoryStore::new());
        let y = session(&store, "Y", "one");
        router.register(Y, &y);
        router.focus_in(&[Y]);
        y.borrow_mut().teardown();

        host.dispatch("editor:duplicate-line");
        assert_eq!(*host.handled.borrow(), vec!["editor:duplicate-line"]);
    }
}
