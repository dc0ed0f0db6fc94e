//! Per-session render driver.
//!
//! Contract:
//! - One `HidGenerator` per session, shared by every page of the session
//!   (prefetch passes included), so ids never collide within a session.
//! - Each page serializes its own renders: concurrent updates of one page are
//!   applied one after the other, never interleaved.
//! - A patch batch moves a page from `from` to `to == from.next()`. An initial
//!   render starts a fresh client document at `RenderVersion::INITIAL`.

use core_types::{RenderVersion, SessionId};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use vdom::{
    DiffOptions, HidGenerator, HidPolicy, Node, Patch, RenderOptions, Stamp, assign_with_policy,
    clear_hids, copy_hids, diff_with, render_html,
};

#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Which elements get hydration ids on initial render and adoption.
    pub hid_policy: HidPolicy,
    /// Stamp subtrees carried by insert/replace patches so later batches can
    /// address them.
    pub stamp_inserted: bool,
    /// Markup attribute carrying the hydration id.
    pub hid_attribute: Cow<'static, str>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            hid_policy: HidPolicy::Interactive,
            stamp_inserted: true,
            hid_attribute: Cow::Borrowed("data-hid"),
        }
    }
}

impl SessionConfig {
    fn render_options(&self) -> RenderOptions {
        RenderOptions {
            hid_attribute: self.hid_attribute.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    NotRendered { route: String },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::NotRendered { route } => {
                write!(f, "page {route:?} has no initial render")
            }
        }
    }
}

impl std::error::Error for SessionError {}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InitialRender {
    pub version: RenderVersion,
    pub html: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PatchBatch {
    pub from: RenderVersion,
    pub to: RenderVersion,
    pub patches: Vec<Patch>,
}

impl PatchBatch {
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdoptOutcome {
    /// Ids were carried over from the retained tree.
    Copied,
    /// Shapes differed; the tree got fresh ids and the client needs new markup.
    Reassigned,
}

pub struct Session {
    id: SessionId,
    config: Arc<SessionConfig>,
    generator: Arc<HidGenerator>,
    pages: Mutex<HashMap<String, Arc<Page>>>,
}

impl Session {
    pub fn new(id: SessionId, config: SessionConfig) -> Self {
        Self {
            id,
            config: Arc::new(config),
            generator: Arc::new(HidGenerator::new()),
            pages: Mutex::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn generator(&self) -> &Arc<HidGenerator> {
        &self.generator
    }

    /// Page state for `route`, created on first use.
    pub fn page(&self, route: &str) -> Arc<Page> {
        let mut pages = self.pages.lock().unwrap_or_else(PoisonError::into_inner);
        let page = pages.entry(route.to_string()).or_insert_with(|| {
            log::debug!(target: "livetree.session", "{} open page {route:?}", self.id);
            Arc::new(Page {
                route: route.to_string(),
                session: self.id,
                config: Arc::clone(&self.config),
                generator: Arc::clone(&self.generator),
                state: Mutex::new(PageState::default()),
            })
        });
        Arc::clone(page)
    }

    pub fn close_page(&self, route: &str) -> bool {
        let mut pages = self.pages.lock().unwrap_or_else(PoisonError::into_inner);
        pages.remove(route).is_some()
    }

    pub fn routes(&self) -> Vec<String> {
        let pages = self.pages.lock().unwrap_or_else(PoisonError::into_inner);
        let mut routes: Vec<String> = pages.keys().cloned().collect();
        routes.sort();
        routes
    }
}

pub struct Page {
    route: String,
    session: SessionId,
    config: Arc<SessionConfig>,
    generator: Arc<HidGenerator>,
    state: Mutex<PageState>,
}

#[derive(Default)]
struct PageState {
    version: RenderVersion,
    tree: Option<Node>,
}

impl Page {
    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn version(&self) -> RenderVersion {
        self.lock().version
    }

    /// The tree the client currently shows, ids included.
    pub fn tree(&self) -> Option<Node> {
        self.lock().tree.clone()
    }

    pub fn render_initial(&self, mut tree: Node) -> InitialRender {
        let mut state = self.lock();
        assign_with_policy(&mut tree, &self.generator, self.config.hid_policy);
        let html = render_html(&tree, &self.config.render_options());
        log::debug!(
            target: "livetree.session",
            "{} {:?}: initial render, {} bytes",
            self.session,
            self.route,
            html.len()
        );
        state.tree = Some(tree);
        state.version = RenderVersion::INITIAL;
        InitialRender {
            version: state.version,
            html,
        }
    }

    pub fn update(&self, mut next: Node) -> Result<PatchBatch, SessionError> {
        let mut state = self.lock();
        let Some(prev) = state.tree.as_ref() else {
            return Err(self.not_rendered());
        };
        let options = DiffOptions {
            stamp: self.config.stamp_inserted.then_some(Stamp {
                generator: &self.generator,
                policy: self.config.hid_policy,
            }),
        };
        let patches = diff_with(Some(prev), Some(&mut next), &options);
        let from = state.version;
        let to = from.next();
        log::debug!(
            target: "livetree.session",
            "{} {:?}: {} patches ({from} -> {to})",
            self.session,
            self.route,
            patches.len()
        );
        state.tree = Some(next);
        state.version = to;
        Ok(PatchBatch { from, to, patches })
    }

    /// Take over `tree` as the shown tree without diffing, e.g. after a reconnect.
    pub fn adopt(&self, mut tree: Node) -> Result<AdoptOutcome, SessionError> {
        let mut state = self.lock();
        let Some(current) = state.tree.as_ref() else {
            return Err(self.not_rendered());
        };
        let outcome = if copy_hids(current, &mut tree) {
            AdoptOutcome::Copied
        } else {
            log::debug!(
                target: "livetree.session",
                "{} {:?}: adopt shape mismatch, reassigning ids",
                self.session,
                self.route
            );
            clear_hids(&mut tree);
            assign_with_policy(&mut tree, &self.generator, self.config.hid_policy);
            AdoptOutcome::Reassigned
        };
        state.tree = Some(tree);
        Ok(outcome)
    }

    fn not_rendered(&self) -> SessionError {
        SessionError::NotRendered {
            route: self.route.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use vdom::{Hid, PatchOp, collect_hids};

    fn counter(count: i64) -> Node {
        Node::element("div").with_children([
            Node::element("span").with_child(Node::text(count.to_string())),
            Node::element("button")
                .on("click", "inc")
                .with_child(Node::text("+")),
        ])
    }

    #[test]
    fn initial_render_marks_interactive_nodes() {
        let session = Session::new(SessionId(1), SessionConfig::default());
        let page = session.page("/counter");
        let initial = page.render_initial(counter(0));
        assert_eq!(initial.version, RenderVersion::INITIAL);
        assert_eq!(
            initial.html,
            r#"<div><span>0</span><button data-hid="h1">+</button></div>"#
        );
    }

    #[test]
    fn updates_are_versioned_batches() {
        let session = Session::new(SessionId(1), SessionConfig::default());
        let page = session.page("/counter");
        page.render_initial(counter(0));

        let first = page.update(counter(1)).expect("rendered");
        assert_eq!(first.from, RenderVersion::INITIAL);
        assert_eq!(first.to, RenderVersion(1));
        assert_eq!(first.patches.len(), 1);
        assert_eq!(first.patches[0].op(), PatchOp::SetText);
        // the span is not interactive, so the default policy leaves it unaddressed
        assert!(first.patches[0].target().is_empty());

        let second = page.update(counter(1)).expect("rendered");
        assert!(second.is_empty());
        assert_eq!(second.from, first.to);
        assert_eq!(page.version(), RenderVersion(2));
    }

    #[test]
    fn full_policy_addresses_every_element() {
        let config = SessionConfig {
            hid_policy: HidPolicy::All,
            ..SessionConfig::default()
        };
        let session = Session::new(SessionId(1), config);
        let page = session.page("/counter");
        page.render_initial(counter(0));

        let batch = page.update(counter(1)).expect("rendered");
        assert_eq!(
            batch.patches,
            vec![Patch::SetText {
                hid: Hid::from("h2"),
                text: "1".to_string(),
            }]
        );
    }

    #[test]
    fn update_before_render_fails() {
        let session = Session::new(SessionId(2), SessionConfig::default());
        let err = session.page("/x").update(counter(0)).expect_err("not rendered");
        assert_eq!(
            err,
            SessionError::NotRendered {
                route: "/x".to_string()
            }
        );
        assert!(err.to_string().contains("/x"));
    }

    #[test]
    fn inserted_subtrees_are_stamped() {
        let config = SessionConfig {
            hid_policy: HidPolicy::All,
            ..SessionConfig::default()
        };
        let session = Session::new(SessionId(3), config);
        let page = session.page("/list");
        page.render_initial(Node::element("ul"));
        let batch = page
            .update(Node::element("ul").with_child(Node::element("li").with_key("a")))
            .expect("rendered");
        let Patch::InsertNode { node, .. } = &batch.patches[0] else {
            panic!("expected insert, got {:?}", batch.patches);
        };
        assert_eq!(node.hid.as_str(), "h2");
        let tree = page.tree().expect("retained");
        assert_eq!(tree.children()[0].hid.as_str(), "h2");
    }

    #[test]
    fn pages_share_the_session_counter() {
        let session = Session::new(SessionId(4), SessionConfig::default());
        let home = session.page("/");
        let prefetch = session.page("/next");
        home.render_initial(counter(0));
        prefetch.render_initial(counter(0));
        let a = home.tree().expect("rendered");
        let b = prefetch.tree().expect("rendered");
        let ids_a: Vec<_> = collect_hids(&a).into_keys().collect();
        let ids_b: Vec<_> = collect_hids(&b).into_keys().collect();
        assert!(ids_a.iter().all(|id| !ids_b.contains(id)));
        assert_eq!(session.routes(), vec!["/".to_string(), "/next".to_string()]);
        assert!(Arc::ptr_eq(&session.page("/"), &home));
    }

    #[test]
    fn adopt_copies_or_reassigns() {
        let session = Session::new(SessionId(5), SessionConfig::default());
        let page = session.page("/counter");
        page.render_initial(counter(0));

        assert_eq!(page.adopt(counter(7)), Ok(AdoptOutcome::Copied));
        let tree = page.tree().expect("rendered");
        assert_eq!(tree.children()[1].hid.as_str(), "h1");

        let reshaped = counter(7).with_child(Node::element("p").on("click", "x"));
        assert_eq!(page.adopt(reshaped), Ok(AdoptOutcome::Reassigned));
        let tree = page.tree().expect("rendered");
        let ids: Vec<&str> = tree
            .children()
            .iter()
            .map(|child| child.hid.as_str())
            .collect();
        assert_eq!(ids, vec!["", "h2", "h3"]);
    }

    #[test]
    fn concurrent_updates_form_a_chain() {
        let session = Session::new(SessionId(6), SessionConfig::default());
        let page = session.page("/counter");
        page.render_initial(counter(0));

        let handles: Vec<_> = (1..=8)
            .map(|n| {
                let page = Arc::clone(&page);
                thread::spawn(move || page.update(counter(n)).expect("rendered"))
            })
            .collect();
        let mut batches: Vec<PatchBatch> = handles
            .into_iter()
            .map(|handle| handle.join().expect("thread"))
            .collect();
        batches.sort_by_key(|batch| batch.from);
        for (i, batch) in batches.iter().enumerate() {
            assert_eq!(batch.from, RenderVersion(i as u64));
            assert_eq!(batch.to, batch.from.next());
        }
        assert_eq!(page.version(), RenderVersion(8));
    }

    #[test]
    fn close_page_forgets_state() {
        let session = Session::new(SessionId(7), SessionConfig::default());
        session.page("/a").render_initial(counter(0));
        assert!(session.close_page("/a"));
        assert!(!session.close_page("/a"));
        assert!(session.page("/a").tree().is_none());
    }
}
