use crate::domain_model::AuthEvent;
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Snapshot of the refresh machinery for display surfaces (the little
/// status widget). Folded from the event bus; sign-out resets it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshStatus {
    pub active: bool,
    pub last_refresh: Option<DateTime<Utc>>,
    pub next_refresh: Option<DateTime<Utc>>,
    pub refresh_count: u32,
}

pub struct StatusMonitor;

impl StatusMonitor {
    pub fn spawn(
        events: &broadcast::Sender<AuthEvent>,
        cancel: CancellationToken,
    ) -> (watch::Receiver<RefreshStatus>, JoinHandle<()>) {
        let (tx, rx) = watch::channel(RefreshStatus {
            active: true,
            ..RefreshStatus::default()
        });
        let mut bus = events.subscribe();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    event = bus.recv() => match event {
                        Ok(AuthEvent::Refreshed { at }) => {
                            tx.send_modify(|status| {
                                status.active = true;
                                status.last_refresh = Some(at);
                                status.refresh_count += 1;
                            });
                        }
                        Ok(AuthEvent::RefreshScheduled { fire_in }) => {
                            let eta = Utc::now()
                                + chrono::Duration::from_std(fire_in)
                                    .unwrap_or_else(|_| chrono::Duration::zero());
                            tx.send_modify(|status| {
                                status.active = true;
                                status.next_refresh = Some(eta);
                            });
                        }
                        Ok(AuthEvent::LoggedOut) => {
                            tx.send_replace(RefreshStatus::default());
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        });

        (rx, handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn folds_events_into_a_snapshot() {
        let (events, _keep) = broadcast::channel(16);
        let cancel = CancellationToken::new();
        let (mut status, handle) = StatusMonitor::spawn(&events, cancel.clone());

        assert!(status.borrow().active);
        assert_eq!(status.borrow().refresh_count, 0);

        let at = Utc::now();
        events.send(AuthEvent::Refreshed { at }).unwrap();
        events
            .send(AuthEvent::RefreshScheduled {
                fire_in: Duration::from_secs(600),
            })
            .unwrap();

        status.changed().await.unwrap();
        while status.borrow().next_refresh.is_none() {
            status.changed().await.unwrap();
        }
        {
            let snapshot = status.borrow();
            assert_eq!(snapshot.refresh_count, 1);
            assert_eq!(snapshot.last_refresh, Some(at));
            assert!(snapshot.next_refresh.is_some());
        }

        events.send(AuthEvent::LoggedOut).unwrap();
        status.changed().await.unwrap();
        assert_eq!(*status.borrow(), RefreshStatus::default());

        cancel.cancel();
        let _ = handle.await;
    }
}
