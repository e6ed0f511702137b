//! Single-writer controller — owns the store and serializes every mutation.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use dayokr_config::{AppConfig, RewriterConfig};
use dayokr_llm::{Rewrite, RewriteError, Rewriter, RewriterSettings};
use dayokr_store::{
    CompletionLog, CompletionRecord, Goal, GoalStore, KeyResult, StoreError, model,
};

use crate::commands::ViewCommand;
use crate::events::{NoticeLevel, ViewEvent};

/// Map the rewriter config section onto client settings.
pub fn rewriter_settings(config: &RewriterConfig) -> RewriterSettings {
    RewriterSettings {
        api_url: config.api_url.clone(),
        api_key: config.api_key.clone(),
        model: config.model.clone(),
        temperature: config.temperature,
        max_tokens: config.max_tokens,
        timeout: Duration::from_secs(config.timeout_secs),
    }
}

enum ControllerMessage {
    Attach(ViewHandle),
    Detach(Uuid),
    Command(ViewCommand),
}

struct ViewHandle {
    id: Uuid,
    tx: mpsc::UnboundedSender<ViewEvent>,
}

/// A view's end of the protocol: receives [`ViewEvent`]s pushed by the
/// controller.  Dropping the session detaches it, so a replaced or
/// abandoned view can never receive another event.
pub struct ViewSession {
    id: Uuid,
    controller: mpsc::UnboundedSender<ControllerMessage>,
    rx: mpsc::UnboundedReceiver<ViewEvent>,
}

impl ViewSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Next pushed event; `None` once the controller has let go of this
    /// view (replacement, cancel, or shutdown).
    pub async fn recv(&mut self) -> Option<ViewEvent> {
        self.rx.recv().await
    }
}

impl Drop for ViewSession {
    fn drop(&mut self) {
        let _ = self.controller.send(ControllerMessage::Detach(self.id));
    }
}

/// Cloneable sender half used by views and headless commands.
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    tx: mpsc::UnboundedSender<ControllerMessage>,
}

impl ControllerHandle {
    /// Register a new view, displacing whichever view was attached before.
    pub fn attach_view(&self) -> ViewSession {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        let _ = self.tx.send(ControllerMessage::Attach(ViewHandle { id, tx }));
        ViewSession {
            id,
            controller: self.tx.clone(),
            rx,
        }
    }

    /// Queue one command.  Commands from all handles are applied strictly
    /// in arrival order by the controller task.
    pub fn send(&self, command: ViewCommand) {
        let _ = self.tx.send(ControllerMessage::Command(command));
    }
}

/// Owns the goal store, the completion log, and the rewriter client, and is
/// the only task that ever touches them.  Views talk to it exclusively
/// through [`ControllerHandle`], so two rapid edits can never interleave
/// their read-modify-write cycles on the goal file.
pub struct Controller {
    store: GoalStore,
    rewriter: Rewriter,
    log: CompletionLog,
    view: Option<ViewHandle>,
    rx: mpsc::UnboundedReceiver<ControllerMessage>,
}

impl Controller {
    pub fn new(
        store: GoalStore,
        rewriter: Rewriter,
        log: CompletionLog,
    ) -> (Self, ControllerHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = Self {
            store,
            rewriter,
            log,
            view: None,
            rx,
        };
        (controller, ControllerHandle { tx })
    }

    /// Wire up store, log, and rewriter from the loaded config.
    pub fn from_config(config: &AppConfig) -> (Self, ControllerHandle) {
        let store = GoalStore::new(&config.workspace.path);
        let log = CompletionLog::in_dir(store.dir());
        let rewriter = Rewriter::new(rewriter_settings(&config.rewriter));
        Self::new(store, rewriter, log)
    }

    /// Consume messages until every handle is dropped.
    pub async fn run(mut self) {
        info!(dir = %self.store.dir().display(), "controller running");
        while let Some(message) = self.rx.recv().await {
            match message {
                ControllerMessage::Attach(handle) => {
                    debug!(view = %handle.id, "view attached");
                    self.view = Some(handle);
                }
                ControllerMessage::Detach(id) => {
                    if self.view.as_ref().is_some_and(|v| v.id == id) {
                        self.view = None;
                        debug!(view = %id, "view detached");
                    }
                }
                ControllerMessage::Command(command) => self.handle_command(command).await,
            }
        }
        debug!("all controller handles dropped, stopping");
    }

    async fn handle_command(&mut self, command: ViewCommand) {
        match command {
            ViewCommand::Init | ViewCommand::Refresh => self.push_state(),
            ViewCommand::Save {
                objective,
                key_results,
                use_rewriter,
            } => self.handle_save(objective, key_results, use_rewriter).await,
            ViewCommand::Cancel => {
                self.emit(ViewEvent::Closed);
                self.view = None;
            }
            ViewCommand::UpdateKr { index, patch } => {
                let result = self.store.update_kr(index, patch);
                self.apply(result);
            }
            ViewCommand::AddKr { content } => {
                let result = self.store.add_kr(&content);
                self.apply(result);
            }
            ViewCommand::DeleteKr { index } => {
                let result = self.store.delete_kr(index);
                self.apply(result);
            }
            ViewCommand::ReorderKr { from, to } => {
                let result = self.store.reorder_kr(from, to);
                self.apply(result);
            }
            ViewCommand::SaveLog {
                total_time,
                time_range,
            } => self.handle_save_log(total_time, time_range).await,
        }
    }

    async fn handle_save(
        &mut self,
        objective: String,
        mut key_results: Vec<KeyResult>,
        use_rewriter: bool,
    ) {
        // Reject bad input before any network round trip.
        if let Err(err) = model::validate_new(&objective, &key_results) {
            self.report(err);
            return;
        }

        if use_rewriter {
            if !self.rewriter.has_credential() {
                self.emit(ViewEvent::Notice {
                    level: NoticeLevel::Warning,
                    message: "no API key configured, saving key results as written".to_string(),
                });
            } else {
                self.emit(ViewEvent::RewriteStarted);
                let mut failed = 0usize;
                for kr in &mut key_results {
                    match self.rewriter.rewrite(&kr.content).await {
                        Ok(Rewrite::Improved(text)) => kr.content = text,
                        Ok(Rewrite::SkippedNoCredential) => break,
                        Err(RewriteError::Unauthorized) => {
                            // The credential will not become valid mid-save.
                            self.emit(ViewEvent::Notice {
                                level: NoticeLevel::Warning,
                                message: RewriteError::Unauthorized.to_string(),
                            });
                            break;
                        }
                        Err(err) => {
                            warn!(%err, "key result rewrite failed, keeping original wording");
                            failed += 1;
                        }
                    }
                }
                if failed > 0 {
                    self.emit(ViewEvent::Notice {
                        level: NoticeLevel::Warning,
                        message: format!("{failed} rewrite call(s) failed, original wording kept"),
                    });
                }
                self.emit(ViewEvent::RewriteFinished);
            }
        }

        match self.store.create(&objective, key_results) {
            Ok(goal) => {
                self.emit(ViewEvent::Saved);
                self.emit(ViewEvent::State { goal: Some(goal) });
            }
            Err(err) => self.report(err),
        }
    }

    async fn handle_save_log(&mut self, total_time: String, time_range: String) {
        let goal = match self.store.load() {
            Ok(goal) => goal,
            Err(err) => {
                self.report(err);
                return;
            }
        };

        let record = CompletionRecord::from_goal(&goal, total_time, time_range);
        if let Err(err) = self.log.append(&record).await {
            self.report(err);
            return;
        }

        match self.store.prune_old() {
            Ok(removed) if removed > 0 => debug!(removed, "pruned superseded goal files"),
            Ok(_) => {}
            // The record is already in the log; leftover files only cost disk.
            Err(err) => warn!(%err, "pruning after archive failed"),
        }

        self.emit(ViewEvent::Notice {
            level: NoticeLevel::Info,
            message: format!("day {} archived to the completion log", goal.date),
        });
        self.push_state();
    }

    fn push_state(&mut self) {
        match self.store.load() {
            Ok(goal) => self.emit(ViewEvent::State { goal: Some(goal) }),
            Err(StoreError::NotFound(_)) => self.emit(ViewEvent::State { goal: None }),
            Err(err) => self.report(err),
        }
    }

    fn apply(&mut self, result: Result<Goal, StoreError>) {
        match result {
            Ok(goal) => self.emit(ViewEvent::State { goal: Some(goal) }),
            Err(err) => self.report(err),
        }
    }

    fn report(&mut self, err: StoreError) {
        if err.is_validation() {
            self.emit(ViewEvent::Notice {
                level: NoticeLevel::Warning,
                message: err.to_string(),
            });
        } else {
            error!(%err, "store operation failed");
            self.emit(ViewEvent::Error {
                message: err.to_string(),
            });
        }
    }

    fn emit(&mut self, event: ViewEvent) {
        if let Some(view) = &self.view {
            if view.tx.send(event).is_err() {
                // Receiver gone without a detach; forget the handle.
                self.view = None;
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn spawn_controller(root: &std::path::Path) -> ControllerHandle {
        let store = GoalStore::new(root);
        let log = CompletionLog::in_dir(store.dir());
        let rewriter = Rewriter::new(RewriterSettings::default());
        let (controller, handle) = Controller::new(store, rewriter, log);
        tokio::spawn(controller.run());
        handle
    }

    fn sample_krs() -> Vec<KeyResult> {
        vec![KeyResult::new("write draft", 0), KeyResult::new("review", 0)]
    }

    #[tokio::test]
    async fn init_without_goal_pushes_empty_state() {
        let dir = TempDir::new().unwrap();
        let handle = spawn_controller(dir.path());

        let mut session = handle.attach_view();
        handle.send(ViewCommand::Init);

        assert_eq!(session.recv().await, Some(ViewEvent::State { goal: None }));
    }

    #[tokio::test]
    async fn save_persists_and_pushes_state() {
        let dir = TempDir::new().unwrap();
        let handle = spawn_controller(dir.path());
        let mut session = handle.attach_view();

        handle.send(ViewCommand::Save {
            objective: "ship the report".to_string(),
            key_results: sample_krs(),
            use_rewriter: false,
        });

        assert_eq!(session.recv().await, Some(ViewEvent::Saved));
        match session.recv().await {
            Some(ViewEvent::State { goal: Some(goal) }) => {
                assert_eq!(goal.objective, "ship the report");
                let weights: Vec<u8> = goal.key_results.iter().map(|kr| kr.weight).collect();
                assert_eq!(weights, vec![50, 50]);
            }
            other => panic!("expected state push, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn save_with_blank_objective_is_a_warning_and_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let handle = spawn_controller(dir.path());
        let mut session = handle.attach_view();

        handle.send(ViewCommand::Save {
            objective: "   ".to_string(),
            key_results: sample_krs(),
            use_rewriter: false,
        });

        match session.recv().await {
            Some(ViewEvent::Notice { level, message }) => {
                assert_eq!(level, NoticeLevel::Warning);
                assert_eq!(message, "objective must not be empty");
            }
            other => panic!("expected warning notice, got {other:?}"),
        }
        assert!(!dir.path().join("todos").exists());
    }

    #[tokio::test]
    async fn save_with_rewriter_but_no_credential_warns_and_saves_as_written() {
        let dir = TempDir::new().unwrap();
        let handle = spawn_controller(dir.path());
        let mut session = handle.attach_view();

        handle.send(ViewCommand::Save {
            objective: "ship the report".to_string(),
            key_results: vec![KeyResult::new("write draft", 0)],
            use_rewriter: true,
        });

        match session.recv().await {
            Some(ViewEvent::Notice { level, .. }) => assert_eq!(level, NoticeLevel::Warning),
            other => panic!("expected credential warning, got {other:?}"),
        }
        assert_eq!(session.recv().await, Some(ViewEvent::Saved));
        match session.recv().await {
            Some(ViewEvent::State { goal: Some(goal) }) => {
                assert_eq!(goal.key_results[0].content, "write draft");
                assert_eq!(goal.key_results[0].weight, 100);
            }
            other => panic!("expected state push, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn toggling_completion_stamps_a_time() {
        let dir = TempDir::new().unwrap();
        let handle = spawn_controller(dir.path());
        let mut session = handle.attach_view();

        handle.send(ViewCommand::Save {
            objective: "ship the report".to_string(),
            key_results: sample_krs(),
            use_rewriter: false,
        });
        session.recv().await; // Saved
        session.recv().await; // State

        handle.send(ViewCommand::UpdateKr {
            index: 0,
            patch: dayokr_store::KrPatch {
                content: "write draft".to_string(),
                weight: 50,
                completed: true,
                completion_time: None,
            },
        });

        match session.recv().await {
            Some(ViewEvent::State { goal: Some(goal) }) => {
                assert!(goal.key_results[0].completed);
                assert!(goal.key_results[0].completion_time.is_some());
            }
            other => panic!("expected state push, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn out_of_range_mutation_is_a_warning() {
        let dir = TempDir::new().unwrap();
        let handle = spawn_controller(dir.path());
        let mut session = handle.attach_view();

        handle.send(ViewCommand::Save {
            objective: "ship the report".to_string(),
            key_results: sample_krs(),
            use_rewriter: false,
        });
        session.recv().await;
        session.recv().await;

        handle.send(ViewCommand::DeleteKr { index: 9 });
        match session.recv().await {
            Some(ViewEvent::Notice { level, .. }) => assert_eq!(level, NoticeLevel::Warning),
            other => panic!("expected warning notice, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn save_log_archives_and_keeps_current_file() {
        let dir = TempDir::new().unwrap();
        let handle = spawn_controller(dir.path());
        let mut session = handle.attach_view();

        handle.send(ViewCommand::Save {
            objective: "ship the report".to_string(),
            key_results: sample_krs(),
            use_rewriter: false,
        });
        session.recv().await;
        session.recv().await;

        handle.send(ViewCommand::SaveLog {
            total_time: "4h".to_string(),
            time_range: "09:00-13:00".to_string(),
        });

        match session.recv().await {
            Some(ViewEvent::Notice { level, .. }) => assert_eq!(level, NoticeLevel::Info),
            other => panic!("expected info notice, got {other:?}"),
        }
        assert!(matches!(
            session.recv().await,
            Some(ViewEvent::State { goal: Some(_) })
        ));

        let log = CompletionLog::in_dir(dir.path().join("todos"));
        let records = log.load().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].objective, "ship the report");
        assert_eq!(records[0].total_time, "4h");
    }

    #[tokio::test]
    async fn save_log_without_goal_reports_error() {
        let dir = TempDir::new().unwrap();
        let handle = spawn_controller(dir.path());
        let mut session = handle.attach_view();

        handle.send(ViewCommand::SaveLog {
            total_time: "0h".to_string(),
            time_range: String::new(),
        });

        assert!(matches!(
            session.recv().await,
            Some(ViewEvent::Error { .. })
        ));
    }

    #[tokio::test]
    async fn attaching_a_second_view_displaces_the_first() {
        let dir = TempDir::new().unwrap();
        let handle = spawn_controller(dir.path());

        let mut first = handle.attach_view();
        let mut second = handle.attach_view();
        handle.send(ViewCommand::Init);

        assert_eq!(second.recv().await, Some(ViewEvent::State { goal: None }));
        // The displaced view's channel closes instead of receiving events.
        assert_eq!(first.recv().await, None);
    }

    #[tokio::test]
    async fn dropping_a_session_detaches_it() {
        let dir = TempDir::new().unwrap();
        let handle = spawn_controller(dir.path());

        let session = handle.attach_view();
        drop(session);
        handle.send(ViewCommand::Refresh); // must not wedge the controller

        let mut replacement = handle.attach_view();
        handle.send(ViewCommand::Init);
        assert_eq!(
            replacement.recv().await,
            Some(ViewEvent::State { goal: None })
        );
    }

    #[tokio::test]
    async fn cancel_closes_and_releases_the_view() {
        let dir = TempDir::new().unwrap();
        let handle = spawn_controller(dir.path());
        let mut session = handle.attach_view();

        handle.send(ViewCommand::Cancel);

        assert_eq!(session.recv().await, Some(ViewEvent::Closed));
        assert_eq!(session.recv().await, None);
    }

    #[test]
    fn commands_serialize_with_type_tags() {
        let raw = serde_json::to_value(ViewCommand::AddKr {
            content: "new kr".to_string(),
        })
        .unwrap();
        assert_eq!(raw["type"], "add_kr");
        assert_eq!(raw["content"], "new kr");

        let raw = serde_json::to_value(ViewCommand::ReorderKr { from: 0, to: 2 }).unwrap();
        assert_eq!(raw["type"], "reorder_kr");
        assert_eq!(raw["from"], 0);
        assert_eq!(raw["to"], 2);
    }

    #[test]
    fn events_serialize_with_type_tags() {
        let raw = serde_json::to_value(ViewEvent::Notice {
            level: NoticeLevel::Warning,
            message: "careful".to_string(),
        })
        .unwrap();
        assert_eq!(raw["type"], "notice");
        assert_eq!(raw["level"], "warning");

        let raw = serde_json::to_value(ViewEvent::State { goal: None }).unwrap();
        assert_eq!(raw["type"], "state");
    }
}
