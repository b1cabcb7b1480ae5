use std::{
  sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
  },
  time::Duration,
};

use crate::view::Loader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JumpTicket {
  pub id: u64,
  pub target: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpOutcome {
  /// The target is loaded; recenter on it.
  Exact { offset: u64 },
  /// The target could not be covered (past the end, or its fetch failed); recenter on the
  /// closest loaded offset instead.
  Clamped { requested: u64, offset: u64 },
  /// A newer jump started before this one resolved.
  Superseded { requested: u64 },
  /// Nothing near the target is loaded.
  Unavailable { requested: u64 },
}

impl JumpOutcome {
  pub fn recenter_offset(&self) -> Option<u64> {
    match *self {
      JumpOutcome::Exact { offset } | JumpOutcome::Clamped { offset, .. } => Some(offset),
      JumpOutcome::Superseded { .. } | JumpOutcome::Unavailable { .. } => None,
    }
  }
}

/// Loads a neighbourhood around a target offset and decides where the viewport recenters.
///
/// Jumps never cancel each other's fetches; only the latest ticket gets to recenter.
pub struct JumpCoordinator {
  loader: Arc<Loader>,
  margin: u64,
  wait: Duration,
  latest: AtomicU64,
}

impl JumpCoordinator {
  pub fn new(loader: Arc<Loader>, margin: u64, wait: Duration) -> Self {
    Self {
      loader,
      margin,
      wait,
      latest: AtomicU64::new(0),
    }
  }

  pub fn begin(&self, target: u64) -> JumpTicket {
    let id = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
    JumpTicket { id, target }
  }

  pub fn is_current(&self, ticket: JumpTicket) -> bool {
    self.latest.load(Ordering::SeqCst) == ticket.id
  }

  pub async fn jump_to(&self, target: u64) -> JumpOutcome {
    let ticket = self.begin(target);
    self.resolve(ticket).await
  }

  pub async fn resolve(&self, ticket: JumpTicket) -> JumpOutcome {
    let requested = ticket.target;
    let mut anchor = match self.loader.total() {
      Some(0) => return JumpOutcome::Unavailable { requested },
      Some(total) => requested.min(total - 1),
      None => requested,
    };

    let mut covered = self.load_around(requested, anchor).await;
    // The total may only have arrived with the fetched pages.
    if let Some(total) = self.loader.total().filter(|t| *t > 0 && anchor >= *t) {
      anchor = total - 1;
      covered = self.load_around(requested, anchor).await;
    }

    if !self.is_current(ticket) {
      return JumpOutcome::Superseded { requested };
    }
    if covered && anchor == requested {
      return JumpOutcome::Exact { offset: requested };
    }
    match self.loader.nearest_covered(anchor) {
      Some(offset) => {
        log::debug!("[jump] target={} clamped to {}", requested, offset);
        JumpOutcome::Clamped { requested, offset }
      }
      None => JumpOutcome::Unavailable { requested },
    }
  }

  /// Loads `[anchor - margin, anchor + margin)` and waits for `anchor` to be covered.
  async fn load_around(&self, requested: u64, anchor: u64) -> bool {
    let lo = anchor.saturating_sub(self.margin);
    let hi = anchor.saturating_add(self.margin).max(anchor.saturating_add(1));
    let fetched = self.loader.request_range(lo..hi).await;
    for e in &fetched.errors {
      log::warn!("[jump] target={} load error: {}", requested, e);
    }
    self.loader.wait_for_offset(anchor, self.wait).await
  }
}
