//! Route table + guard: re-evaluates the current location on every change.

use tokio::sync::mpsc;
use tracing::{error, info};

use crate::guard::{Guard, Rendered};
use crate::router::{Access, Navigator, RouteTable};

/// Redirect chains longer than this are abandoned.
const MAX_REDIRECT_HOPS: usize = 4;

pub struct Dispatcher<N, F> {
    guard: Guard<N>,
    routes: RouteTable,
    views: F,
}

impl<N, F, V> Dispatcher<N, F>
where
    N: Navigator,
    F: Fn(&str) -> V,
{
    pub fn new(guard: Guard<N>, routes: RouteTable, views: F) -> Self {
        Self {
            guard,
            routes,
            views,
        }
    }

    pub fn guard(&self) -> &Guard<N> {
        &self.guard
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Gate one location. Public routes bypass the gate.
    pub fn dispatch(&self, location: &str) -> Rendered<V> {
        match self.routes.resolve(location) {
            None => Rendered::NotFound,
            Some(Access::Public) => Rendered::View((self.views)(location)),
            Some(Access::Protected(requirement)) => {
                self.guard
                    .render_at(location, &requirement, || (self.views)(location))
            }
        }
    }

    /// Dispatch `location` and follow the redirects it causes. Returns the
    /// location that was finally rendered.
    ///
    /// Every step is reported to `on_render`.
    pub fn dispatch_following(
        &self,
        location: &str,
        on_render: &mut impl FnMut(&str, Rendered<V>),
    ) -> String {
        let mut current = location.to_string();
        for _ in 0..=MAX_REDIRECT_HOPS {
            let rendered = self.dispatch(&current);
            let next = match &rendered {
                Rendered::Redirected(target) => Some(target.clone()),
                _ => None,
            };
            on_render(&current, rendered);
            match next {
                Some(target) => current = target,
                None => return current,
            }
        }
        error!(path = location, hops = MAX_REDIRECT_HOPS, "redirect chain abandoned");
        current
    }

    /// Re-dispatch the current location on every session change and every
    /// route change, until the route channel closes.
    ///
    /// Route changes are recorded in the navigator's history before dispatch.
    pub async fn run(
        &self,
        mut route_changes: mpsc::Receiver<String>,
        mut on_render: impl FnMut(&str, Rendered<V>),
    ) {
        let mut session_changes = self.guard.store().subscribe();
        let mut location = self.guard.navigator().current_path();
        info!(path = %location, "dispatcher started");

        loop {
            session_changes.borrow_and_update();
            location = self.dispatch_following(&location, &mut on_render);

            tokio::select! {
                biased;

                changed = session_changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                next = route_changes.recv() => match next {
                    Some(next) => {
                        if self.guard.navigator().current_path() != next {
                            self.guard.navigator().navigate(&next);
                        }
                        location = next;
                    }
                    None => break,
                },
            }
        }

        info!("dispatcher stopped");
    }
}
