// Monitor Supervisor
//
// Owns the monitor tasks: starts them with a fresh shutdown channel, folds
// their status messages into an aggregate health signal and stops them
// cooperatively.

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::application::monitor::constants::STATUS_BROADCAST_CAPACITY;
use crate::application::monitor::{
    shutdown_channel, Monitor, MonitorEvent, ShutdownSender, StatusReporter,
};
use crate::domain::{Health, MonitorStatus};
use crate::error::{AppError, Result};

struct Running {
    shutdown: ShutdownSender,
    monitors: Vec<(&'static str, JoinHandle<()>)>,
    collector: JoinHandle<()>,
}

pub struct MonitorSupervisor {
    events: broadcast::Sender<MonitorEvent>,
    health: Arc<watch::Sender<Health>>,
    running: Option<Running>,
}

impl Default for MonitorSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorSupervisor {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(STATUS_BROADCAST_CAPACITY);
        let (health, _) = watch::channel(Health::Green);
        Self {
            events,
            health: Arc::new(health),
            running: None,
        }
    }

    /// Status messages from every monitor, tagged by monitor
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.events.subscribe()
    }

    /// Aggregate health: red while any monitor's last verdict is an error
    pub fn health(&self) -> watch::Receiver<Health> {
        self.health.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Start every monitor on its own task
    pub fn start(&mut self, monitors: Vec<Box<dyn Monitor>>) -> Result<()> {
        if self.running.is_some() {
            return Err(AppError::InvalidState(
                "monitors are already running".to_string(),
            ));
        }

        let (shutdown, _) = shutdown_channel();
        let (tx, rx) = mpsc::unbounded_channel();
        self.health.send_replace(Health::Green);

        let handles = monitors
            .into_iter()
            .map(|monitor| {
                let name = monitor.name();
                let reporter = StatusReporter::new(name, tx.clone());
                let token = shutdown.token();
                info!(monitor = name, "Starting monitor");

                // Nested spawn isolates panics from the supervisor
                let handle = tokio::spawn(async move {
                    let task = tokio::spawn(monitor.run(reporter.clone(), token));
                    match task.await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => reporter.error(format!("Monitor {} stopped: {}", name, e)),
                        Err(join) if join.is_panic() => {
                            error!(monitor = name, "Monitor panicked: {:?}", join);
                            reporter.error(format!("Monitor {} crashed", name));
                        }
                        Err(_) => {}
                    }
                });
                (name, handle)
            })
            .collect();
        drop(tx);

        let collector = tokio::spawn(collect(rx, self.events.clone(), self.health.clone()));
        self.running = Some(Running {
            shutdown,
            monitors: handles,
            collector,
        });
        Ok(())
    }

    /// Signal shutdown and wait for every monitor to release its resources
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        info!("Stopping monitors");
        running.shutdown.shutdown();

        for (name, handle) in running.monitors {
            if let Err(e) = handle.await {
                warn!(monitor = name, error = %e, "Monitor task did not finish cleanly");
            }
        }
        if let Err(e) = running.collector.await {
            warn!(error = %e, "Status collector did not finish cleanly");
        }
        info!("Monitors stopped");
    }

    /// Stop, then start with a new set of monitors
    pub async fn restart(&mut self, monitors: Vec<Box<dyn Monitor>>) -> Result<()> {
        self.stop().await;
        self.start(monitors)
    }
}

/// Log each event, track the failing set and republish
async fn collect(
    mut rx: mpsc::UnboundedReceiver<MonitorEvent>,
    events: broadcast::Sender<MonitorEvent>,
    health: Arc<watch::Sender<Health>>,
) {
    let mut failing: HashSet<&'static str> = HashSet::new();

    while let Some(event) = rx.recv().await {
        let monitor = event.monitor;
        let text = &event.message.text;
        match event.message.status {
            MonitorStatus::Error => {
                error!(monitor, "{}", text);
                failing.insert(monitor);
            }
            MonitorStatus::Warning => warn!(monitor, "{}", text),
            MonitorStatus::Ok => {
                info!(monitor, "{}", text);
                failing.remove(monitor);
            }
            MonitorStatus::Undefined => info!(monitor, "{}", text),
        }

        let verdict = if failing.is_empty() {
            Health::Green
        } else {
            Health::Red
        };
        health.send_if_modified(|current| {
            let changed = *current != verdict;
            *current = verdict;
            changed
        });
        let _ = events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::monitor::ShutdownToken;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    /// Emits a scripted sequence, then parks until shutdown
    struct Scripted {
        name: &'static str,
        script: Vec<MonitorStatus>,
        released: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Monitor for Scripted {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn run(self: Box<Self>, status: StatusReporter, mut shutdown: ShutdownToken) -> Result<()> {
            for verdict in &self.script {
                status.report(crate::domain::MonitorMessage::new("step", *verdict));
            }
            shutdown.wait().await;
            self.released.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Panicking;

    #[async_trait]
    impl Monitor for Panicking {
        fn name(&self) -> &'static str {
            "panicking"
        }

        async fn run(self: Box<Self>, _status: StatusReporter, _shutdown: ShutdownToken) -> Result<()> {
            panic!("device driver exploded");
        }
    }

    fn scripted(name: &'static str, script: Vec<MonitorStatus>) -> (Box<dyn Monitor>, Arc<AtomicBool>) {
        let released = Arc::new(AtomicBool::new(false));
        (
            Box::new(Scripted {
                name,
                script,
                released: released.clone(),
            }),
            released,
        )
    }

    async fn wait_for(health: &mut watch::Receiver<Health>, expected: Health) {
        tokio::time::timeout(Duration::from_secs(2), health.wait_for(|h| *h == expected))
            .await
            .expect("health did not change")
            .unwrap();
    }

    #[tokio::test]
    async fn test_error_turns_health_red() {
        let mut supervisor = MonitorSupervisor::new();
        let mut health = supervisor.health();
        let (monitor, _) = scripted("printing", vec![MonitorStatus::Error]);

        supervisor.start(vec![monitor]).unwrap();
        wait_for(&mut health, Health::Red).await;
        supervisor.stop().await;
    }

    #[tokio::test]
    async fn test_ok_clears_only_own_error() {
        let mut supervisor = MonitorSupervisor::new();
        let mut events = supervisor.subscribe();
        let (printing, _) = scripted(
            "printing",
            vec![MonitorStatus::Error, MonitorStatus::Ok],
        );
        let (scale, _) = scripted("scale", vec![MonitorStatus::Error]);

        supervisor.start(vec![printing, scale]).unwrap();
        for _ in 0..3 {
            events.recv().await.unwrap();
        }
        assert_eq!(*supervisor.health().borrow(), Health::Red);
        supervisor.stop().await;
    }

    #[tokio::test]
    async fn test_warning_does_not_affect_health() {
        let mut supervisor = MonitorSupervisor::new();
        let mut events = supervisor.subscribe();
        let (monitor, _) = scripted(
            "printing",
            vec![MonitorStatus::Warning, MonitorStatus::Undefined],
        );

        supervisor.start(vec![monitor]).unwrap();
        events.recv().await.unwrap();
        events.recv().await.unwrap();
        assert_eq!(*supervisor.health().borrow(), Health::Green);
        supervisor.stop().await;
    }

    #[tokio::test]
    async fn test_stop_waits_for_release() {
        let mut supervisor = MonitorSupervisor::new();
        let (a, a_released) = scripted("printing", vec![]);
        let (b, b_released) = scripted("scale", vec![]);

        supervisor.start(vec![a, b]).unwrap();
        assert!(supervisor.is_running());
        supervisor.stop().await;

        assert!(!supervisor.is_running());
        assert!(a_released.load(Ordering::SeqCst));
        assert!(b_released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_panic_is_reported_and_others_keep_running() {
        let mut supervisor = MonitorSupervisor::new();
        let mut health = supervisor.health();
        let (healthy, released) = scripted("scale", vec![]);

        supervisor.start(vec![Box::new(Panicking) as Box<dyn Monitor>, healthy]).unwrap();
        wait_for(&mut health, Health::Red).await;
        assert!(!released.load(Ordering::SeqCst));

        supervisor.stop().await;
        assert!(released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected_and_restart_resets_health() {
        let mut supervisor = MonitorSupervisor::new();
        let mut health = supervisor.health();
        let (failing, _) = scripted("printing", vec![MonitorStatus::Error]);
        supervisor.start(vec![failing]).unwrap();
        wait_for(&mut health, Health::Red).await;

        let (again, _) = scripted("printing", vec![]);
        assert!(supervisor.start(vec![again]).is_err());

        let (fresh, _) = scripted("printing", vec![]);
        supervisor.restart(vec![fresh]).await.unwrap();
        assert_eq!(*supervisor.health().borrow(), Health::Green);
        supervisor.stop().await;
    }
}
