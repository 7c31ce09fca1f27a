//! Workflow Orchestrator (spec §4.14): drives one request through the
//! seven-phase state machine, wiring together every other component in
//! this crate and the stores built alongside it.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use csa_audit::{AuditRecord, AuditSink};
use csa_clarify::Questioner;
use csa_core::{AppError, Finding, FindingTier, SecurityTier};
use csa_hooks::PolicySettings;
use csa_memory::EpisodeStore;
use csa_session::{FinalOutcome, SessionPhase, SessionStore};
use csa_updates::{Category, Discovery, PendingUpdateStore};
use serde_json::{Map, Value, json};

use crate::approval::{ApprovalGate, GateOutcome};
use crate::context::provision_context;
use crate::phase::{self, Phase};
use crate::router::{self, AgentDeclaration};

/// One workflow invocation. `planned_command` and `profile_name`, when
/// present, drive phase 5 (Realization); a clarification/routing/context
/// dry-run that never mutates anything can omit both.
pub struct WorkflowRequest {
    pub prompt: String,
    pub context_doc: Value,
    pub infrastructure_root: Option<PathBuf>,
    pub planned_command: Option<String>,
    pub profile_name: Option<String>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct WorkflowOutcome {
    pub episode_id: String,
    pub phase_reached: Phase,
    pub success: bool,
    pub agent_name: Option<String>,
    pub tier: Option<SecurityTier>,
    pub findings: Vec<Finding>,
    pub report: String,
}

pub struct WorkflowOrchestrator {
    episodes: EpisodeStore,
    sessions: SessionStore,
    updates: PendingUpdateStore,
    audit: AuditSink,
    approval_gate: ApprovalGate,
    policy: PolicySettings,
    agents: Vec<AgentDeclaration>,
    /// `.workflow_state.json` (spec §6, §12.4 in SPEC_FULL.md). Advisory
    /// only — never read back by this orchestrator. `None` skips writing
    /// it entirely (e.g. in unit tests with no project root).
    state_path: Option<PathBuf>,
}

impl WorkflowOrchestrator {
    pub fn new(
        episodes: EpisodeStore,
        sessions: SessionStore,
        updates: PendingUpdateStore,
        audit: AuditSink,
        approval_gate: ApprovalGate,
        policy: PolicySettings,
    ) -> Self {
        Self { episodes, sessions, updates, audit, approval_gate, policy, agents: router::standard_agents(), state_path: None }
    }

    /// Enables `.workflow_state.json` persistence at `path`, written
    /// atomically after every phase transition.
    pub fn with_state_path(mut self, path: PathBuf) -> Self {
        self.state_path = Some(path);
        self
    }

    fn persist_state(&self, episode_id: &str, phase: Phase) {
        let Some(path) = &self.state_path else { return };
        let state = json!({
            "episode_id": episode_id,
            "phase": phase,
            "updated_at": Utc::now().to_rfc3339(),
        });
        if let Err(err) = write_atomic(path, &state) {
            tracing::warn!(error = %err, "failed to persist .workflow_state.json");
        }
    }

    fn abandon(
        &self,
        episode_id: String,
        agent_id: Option<&str>,
        phase_reached: Phase,
        agent_name: Option<String>,
        reason: String,
        started_at: chrono::DateTime<Utc>,
    ) -> Result<WorkflowOutcome, AppError> {
        if let Some(agent_id) = agent_id {
            self.sessions.finalize_session(agent_id, FinalOutcome::Abandoned, Some(reason.clone()))?;
        }
        self.episodes.update_outcome(&episode_id, "abandoned", Some(false), Some(elapsed_seconds(started_at)), None)?;
        self.persist_state(&episode_id, phase_reached);
        Ok(WorkflowOutcome {
            episode_id,
            phase_reached,
            success: false,
            agent_name,
            tier: None,
            findings: Vec::new(),
            report: reason,
        })
    }

    /// Run one request through phases 0-6. `questioner` answers
    /// clarification questions; `human_response` is the operator's reply
    /// to a pending approval request, consulted only when phase 3
    /// classifies the planned operation as T3.
    pub async fn run(
        &self,
        request: WorkflowRequest,
        questioner: &dyn Questioner,
        human_response: Option<&str>,
    ) -> Result<WorkflowOutcome, AppError> {
        let started_at = Utc::now();

        // Phase 0: Clarification.
        let clarify_result = csa_clarify::clarify(&request.prompt, &request.context_doc, questioner);

        let episode_id = self.episodes.store_episode(
            request.prompt.clone(),
            Some(clarify_result.enriched_prompt.clone()),
            HashMap::new(),
            Map::from_iter([(
                "workflow".to_string(),
                json!({ "phase_0_timestamp": started_at.to_rfc3339(), "phases_completed": ["phase_0"] }),
            )]),
            Vec::new(),
        )?;
        self.persist_state(&episode_id, Phase::Clarification);

        // Phase 1: Routing.
        let routing = router::route(&clarify_result.enriched_prompt, &self.agents);
        let agent_known = routing
            .as_ref()
            .map(|r| self.agents.iter().any(|a| a.name == r.agent_name))
            .unwrap_or(false);
        let pre_routing = phase::validate_pre_routing(routing.as_ref().map(|r| r.confidence), agent_known);
        if !pre_routing.allowed {
            let agent_name = routing.map(|r| r.agent_name);
            return self.abandon(episode_id, None, Phase::Routing, agent_name, pre_routing.reason, started_at);
        }
        let agent_name = routing.expect("pre_routing.allowed implies a routing result").agent_name;
        let agent = self
            .agents
            .iter()
            .find(|a| a.name == agent_name)
            .expect("pre_routing.allowed implies a registered agent")
            .clone();

        let agent_id = self.sessions.create_session(agent_name.clone(), clarify_result.enriched_prompt.clone(), None)?;
        self.sessions.update_state(&agent_id, Some(SessionPhase::Investigating), None, None)?;
        self.persist_state(&episode_id, Phase::Routing);

        // Phase 2: Context.
        let contract = match provision_context(&agent_name, &clarify_result.enriched_prompt, &agent.required_context_sections, &request.context_doc) {
            Ok(contract) => contract,
            Err(missing) => {
                let guard = phase::validate_pre_context(&missing);
                return self.abandon(episode_id, Some(agent_id.as_str()), Phase::Context, Some(agent_name), guard.reason, started_at);
            }
        };
        self.sessions.update_state(&agent_id, Some(SessionPhase::Planning), None, None)?;
        self.persist_state(&episode_id, Phase::Context);

        // Phase 3: Planning (Five-Layer Executor, Layers A-D).
        let payload = contract.to_payload();
        let required_fields: Vec<&str> = agent.required_context_sections.iter().map(String::as_str).collect();
        let validation = csa_executor::validate_payload(&payload, &required_fields, &[]);
        if !validation.is_valid {
            return self.abandon(episode_id, Some(agent_id.as_str()), Phase::Planning, Some(agent_name), validation.errors.join("; "), started_at);
        }

        let discovery = request
            .infrastructure_root
            .as_deref()
            .map(csa_executor::discover_default)
            .unwrap_or_default();
        let mut findings = csa_executor::classify_findings(&discovery);

        if csa_executor::should_escalate_to_live(&findings) {
            let cwd_timeout = Duration::from_secs(30);
            csa_executor::validate_remote(&mut findings, &self.policy, request.dry_run, |command| {
                let command = command.to_string();
                tokio::task::block_in_place(|| {
                    tokio::runtime::Handle::current().block_on(async {
                        csa_process::run_with_timeout(&command, None, cwd_timeout).await.ok().map(|r| r.stdout)
                    })
                })
            });
        }

        let tier = request
            .planned_command
            .as_deref()
            .map(|command| csa_hooks::evaluate(&self.policy, command, Some(&agent_name)).effective_tier)
            .unwrap_or(SecurityTier::T0);

        self.persist_state(&episode_id, Phase::Planning);

        // Phase 4: Approval (T3 only).
        let approval = if tier == SecurityTier::T3 {
            self.sessions.update_state(&agent_id, Some(SessionPhase::Approval), None, None)?;
            let scope = request.planned_command.clone().unwrap_or_default();
            self.approval_gate.request(
                tier,
                &agent_name,
                request.planned_command.as_deref().unwrap_or(""),
                &scope,
                human_response.unwrap_or(""),
                ChronoDuration::minutes(15),
            )?
        } else {
            GateOutcome::AutoPassed
        };
        let approved = !matches!(approval, GateOutcome::Rejected);

        let post_approval = phase::validate_post_approval(tier, approved);
        if !post_approval.allowed {
            return self.abandon(episode_id, Some(agent_id.as_str()), Phase::Approval, Some(agent_name), post_approval.reason, started_at);
        }
        let pre_realization = phase::validate_pre_realization(tier, approved);
        if !pre_realization.allowed {
            return self.abandon(episode_id, Some(agent_id.as_str()), Phase::Realization, Some(agent_name), pre_realization.reason, started_at);
        }

        self.persist_state(&episode_id, Phase::Approval);

        // Phase 5: Realization (Layer E).
        self.sessions.update_state(&agent_id, Some(SessionPhase::Executing), None, None)?;
        let cwd = request.infrastructure_root.as_deref().and_then(|p| p.to_str());
        let realization_success = if let Some(command) = &request.planned_command {
            let profiles = csa_executor::standard_profiles();
            let profile = request
                .profile_name
                .as_deref()
                .and_then(|name| profiles.get(name))
                .cloned()
                .unwrap_or_else(|| profiles["terraform-validate"].clone());

            let output = csa_executor::execute_with_profile(&profile, command, |cmd, timeout| async move {
                csa_process::run_with_timeout(&cmd, cwd, timeout).await
            })
            .await;

            self.audit.record_best_effort(&AuditRecord::new(
                agent_id.clone(),
                agent_name.clone(),
                command.clone(),
                &json!({}),
                output.duration_ms,
                output.exit_code,
                tier,
                &output.stdout,
            ));

            output.status == csa_executor::ExecStatus::Success
        } else {
            true
        };

        if tier == SecurityTier::T3 {
            // Consume the approval unconditionally: a stale or mismatched
            // file must never outlive this invocation.
            let _ = self.approval_gate.consume(&agent_name, request.planned_command.as_deref().unwrap_or(""));
        }

        self.persist_state(&episode_id, Phase::Realization);

        if !realization_success {
            self.sessions.finalize_session(&agent_id, FinalOutcome::Failed, Some("realization failed".to_string()))?;
            self.episodes.update_outcome(&episode_id, "failed", Some(false), Some(elapsed_seconds(started_at)), request.planned_command.clone().map(|c| vec![c]))?;
            let report = csa_executor::concise_report(&findings);
            return Ok(WorkflowOutcome {
                episode_id,
                phase_reached: Phase::Realization,
                success: false,
                agent_name: Some(agent_name),
                tier: Some(tier),
                findings,
                report,
            });
        }

        // Phase 6: SSOT Update.
        self.sessions.update_state(&agent_id, Some(SessionPhase::Validating), None, None)?;
        let mut pending_update_ids = Vec::new();
        for finding in &findings {
            if let Some(discovery) = discovery_from_finding(finding, &agent_name) {
                match self.updates.create(discovery) {
                    Ok(id) => pending_update_ids.push(id),
                    Err(err) => tracing::warn!(error = %err, "dropping pending update discovery"),
                }
            }
        }
        let ssot_updated = !pending_update_ids.is_empty();
        let post_ssot = phase::validate_post_ssot_update(tier, ssot_updated);

        let success = post_ssot.allowed;
        self.sessions.finalize_session(
            &agent_id,
            if success { FinalOutcome::Completed } else { FinalOutcome::Failed },
            Some(post_ssot.reason.clone()),
        )?;
        self.episodes.update_outcome(
            &episode_id,
            if success { "success" } else { "partial" },
            Some(success),
            Some(elapsed_seconds(started_at)),
            request.planned_command.clone().map(|c| vec![c]),
        )?;

        self.persist_state(&episode_id, Phase::SsotUpdate);

        let report = format!("{}\n\n{} pending update(s) recorded.", csa_executor::concise_report(&findings), pending_update_ids.len());

        Ok(WorkflowOutcome {
            episode_id,
            phase_reached: Phase::SsotUpdate,
            success,
            agent_name: Some(agent_name),
            tier: Some(tier),
            findings,
            report,
        })
    }
}

fn write_atomic(path: &Path, value: &Value) -> Result<(), AppError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(AppError::Io)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(AppError::Io)?;
    tmp.write_all(&serde_json::to_vec_pretty(value)?).map_err(AppError::Io)?;
    tmp.persist(path).map_err(|err| AppError::Io(err.error))?;
    Ok(())
}

fn elapsed_seconds(started_at: chrono::DateTime<Utc>) -> f64 {
    (Utc::now() - started_at).num_milliseconds().max(0) as f64 / 1000.0
}

/// Builds a pending-update discovery from a finding's open `details` map,
/// when the finding carries the `category`/`target_section`/`proposed_change`
/// keys that make it one. Findings with no such keys (most discrepancy and
/// pattern findings) never produce a pending update.
fn discovery_from_finding(finding: &Finding, agent_id: &str) -> Option<Discovery> {
    if !matches!(finding.tier, FindingTier::Deviation | FindingTier::Pattern) {
        return None;
    }
    let category = finding.details.get("category")?.as_str().and_then(|s| Category::from_str(s).ok())?;
    let target_section = finding.details.get("target_section")?.as_str()?.to_string();
    let proposed_change = finding.details.get("proposed_change")?.clone();
    let confidence = finding.details.get("confidence").and_then(Value::as_f64).unwrap_or(0.6);
    Some(Discovery {
        category,
        target_section,
        proposed_change,
        summary: finding.title.clone(),
        confidence,
        agent_id: agent_id.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use csa_clarify::FirstOptionQuestioner;
    use serde_json::json;

    fn orchestrator(root: &std::path::Path) -> WorkflowOrchestrator {
        let episodes = EpisodeStore::new(root.join("episodes")).unwrap();
        let sessions = SessionStore::new(root.join("session")).unwrap();
        let updates = PendingUpdateStore::new(root.join("updates")).unwrap();
        let audit = AuditSink::new(root.join("logs"), root.join("metrics"));
        let approval_gate = ApprovalGate::new(root.join("approvals/pending.json")).unwrap();
        let policy = PolicySettings::new(Vec::new(), &[], &[], &[], Vec::new());
        WorkflowOrchestrator::new(episodes, sessions, updates, audit, approval_gate, policy)
    }

    fn context_doc() -> Value {
        json!({
            "sections": {
                "project_details": {"name": "tcm"},
                "terraform_infrastructure": {"base_path": "./infra"},
                "operational_guidelines": {"rules": []},
            }
        })
    }

    #[tokio::test]
    async fn unroutable_prompt_is_abandoned_at_phase_1() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(dir.path());
        let request = WorkflowRequest {
            prompt: "hello there".to_string(),
            context_doc: context_doc(),
            infrastructure_root: None,
            planned_command: None,
            profile_name: None,
            dry_run: true,
        };
        let outcome = orchestrator.run(request, &FirstOptionQuestioner, None).await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.phase_reached, Phase::Routing);
    }

    #[tokio::test]
    async fn routable_read_only_request_completes_without_approval() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(dir.path());
        let request = WorkflowRequest {
            prompt: "please run terraform plan to provision the new module".to_string(),
            context_doc: context_doc(),
            infrastructure_root: None,
            planned_command: None,
            profile_name: None,
            dry_run: true,
        };
        let outcome = orchestrator.run(request, &FirstOptionQuestioner, None).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.agent_name.as_deref(), Some("terraform-architect"));
        assert_eq!(outcome.tier, Some(SecurityTier::T0));
        assert_eq!(outcome.phase_reached, Phase::SsotUpdate);
    }

    #[tokio::test]
    async fn state_file_tracks_the_final_phase_reached() {
        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join(".workflow_state.json");
        let orchestrator = orchestrator(dir.path()).with_state_path(state_path.clone());
        let request = WorkflowRequest {
            prompt: "please run terraform plan to provision the new module".to_string(),
            context_doc: context_doc(),
            infrastructure_root: None,
            planned_command: None,
            profile_name: None,
            dry_run: true,
        };
        let outcome = orchestrator.run(request, &FirstOptionQuestioner, None).await.unwrap();

        let state: Value = serde_json::from_str(&std::fs::read_to_string(&state_path).unwrap()).unwrap();
        assert_eq!(state["episode_id"], json!(outcome.episode_id));
        assert_eq!(state["phase"], json!("ssot_update"));
    }

    #[tokio::test]
    async fn missing_context_section_is_abandoned_at_phase_2() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(dir.path());
        let sparse_context = json!({ "sections": { "project_details": {"name": "tcm"} } });
        let request = WorkflowRequest {
            prompt: "reconcile the flux helmrelease for the gitops deploy".to_string(),
            context_doc: sparse_context,
            infrastructure_root: None,
            planned_command: None,
            profile_name: None,
            dry_run: true,
        };
        let outcome = orchestrator.run(request, &FirstOptionQuestioner, None).await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.phase_reached, Phase::Context);
    }

    #[tokio::test]
    async fn t3_command_without_approval_is_rejected_before_realization() {
        let dir = tempfile::tempdir().unwrap();
        let episodes = EpisodeStore::new(dir.path().join("episodes")).unwrap();
        let sessions = SessionStore::new(dir.path().join("session")).unwrap();
        let updates = PendingUpdateStore::new(dir.path().join("updates")).unwrap();
        let audit = AuditSink::new(dir.path().join("logs"), dir.path().join("metrics"));
        let approval_gate = ApprovalGate::new(dir.path().join("approvals/pending.json")).unwrap();
        let policy = PolicySettings::new(Vec::new(), &[], &[], &[], Vec::new());
        let orchestrator = WorkflowOrchestrator::new(episodes, sessions, updates, audit, approval_gate, policy);

        let request = WorkflowRequest {
            prompt: "please run terraform plan to provision the new module".to_string(),
            context_doc: context_doc(),
            infrastructure_root: None,
            planned_command: Some("terraform apply".to_string()),
            profile_name: Some("terraform-apply".to_string()),
            dry_run: true,
        };
        let outcome = orchestrator.run(request, &FirstOptionQuestioner, Some("no")).await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.tier, Some(SecurityTier::T3));
        assert_eq!(outcome.phase_reached, Phase::Approval);
    }
}
