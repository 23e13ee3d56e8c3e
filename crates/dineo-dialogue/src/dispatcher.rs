// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The intent dispatcher: one exhaustive match from classified intent to
//! machine step or canned reply.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset};
use dineo_config::DineoConfig;
use dineo_context::{DriverContext, keys};
use dineo_core::DineoError;
use dineo_core::time::iso;
use dineo_core::types::{ConcernType, Driver, Intent, MessageKind};
use dineo_drivers::DriverResolver;
use dineo_reply::{banks, pick_variant};
use dineo_storage::Database;
use dineo_tickets::TicketService;
use serde_json::json;
use tracing::debug;

use crate::machines;
use crate::{kpi, transactional};

/// The knobs the dispatcher and machines honour, lifted out of the full
/// configuration tree.
#[derive(Debug, Clone)]
pub struct DialogueConfig {
    pub assistant_name: String,
    pub login_url: String,
    pub target_online_hours_min: f64,
    pub target_trips: i64,
    pub target_min_ratio: f64,
    pub target_ttl_days: i64,
    pub confirmation_ttl_secs: i64,
    pub no_vehicle_checkin_delay_hours: i64,
    pub daily_min_finished_orders: i64,
    pub pop_pending_ttl_hours: i64,
}

impl DialogueConfig {
    pub fn from_config(config: &DineoConfig) -> Self {
        Self {
            assistant_name: config.assistant.name.clone(),
            login_url: config.assistant.login_url.clone(),
            target_online_hours_min: config.engagement.target_online_hours_min,
            target_trips: config.engagement.target_trips,
            target_min_ratio: config.goal.target_min_ratio,
            target_ttl_days: config.goal.target_ttl_days,
            confirmation_ttl_secs: config.intent.confirmation_ttl_secs,
            no_vehicle_checkin_delay_hours: config.checkin.no_vehicle_delay_hours,
            daily_min_finished_orders: config.intraday.daily_min_finished_orders,
            pop_pending_ttl_hours: config.pop.pending_ttl_hours,
        }
    }

    /// Minimum acceptable weekly online-hours commitment, rounded.
    pub fn min_hours(&self) -> i64 {
        (self.target_online_hours_min * self.target_min_ratio).round() as i64
    }

    /// Minimum acceptable weekly trip commitment, rounded.
    pub fn min_trips(&self) -> i64 {
        (self.target_trips as f64 * self.target_min_ratio).round() as i64
    }
}

/// One inbound turn, already classified.
pub struct Turn<'a> {
    pub wa_id: &'a str,
    pub driver: Option<&'a Driver>,
    pub kind: &'a MessageKind,
    pub intent: Intent,
    pub now: DateTime<FixedOffset>,
}

impl Turn<'_> {
    pub fn text(&self) -> &str {
        self.kind.text().unwrap_or("")
    }
}

pub struct Dispatcher {
    pub(crate) db: Database,
    pub(crate) tickets: TicketService,
    pub(crate) resolver: Arc<DriverResolver>,
    pub(crate) config: DialogueConfig,
}

impl Dispatcher {
    pub fn new(
        db: Database,
        tickets: TicketService,
        resolver: Arc<DriverResolver>,
        config: DialogueConfig,
    ) -> Self {
        Self {
            db,
            tickets,
            resolver,
            config,
        }
    }

    /// Process one turn. Returns the reply body, or `None` when the turn
    /// should stay silent (repeat opt-out, machine already notified).
    pub async fn dispatch(
        &self,
        turn: &Turn<'_>,
        ctx: &mut DriverContext,
    ) -> Result<Option<String>, DineoError> {
        self.purge_stale_state(ctx, turn.now).await?;

        let mut intent = turn.intent;

        // Opt in/out before anything else.
        match intent {
            Intent::OptOut => {
                if ctx.opted_out() {
                    return Ok(None);
                }
                ctx.set(keys::GLOBAL_OPT_OUT, true);
                ctx.set(keys::LAST_INTENT, intent.to_string());
                return Ok(Some(pick_variant(ctx, "opt_out", banks::OPT_OUT_CONFIRM)));
            }
            Intent::OptIn => {
                ctx.remove(keys::GLOBAL_OPT_OUT);
                ctx.set(keys::LAST_INTENT, intent.to_string());
                return Ok(Some(pick_variant(ctx, "opt_in", banks::OPT_IN_CONFIRM)));
            }
            _ => {}
        }

        // Resolve an outstanding yes/no confirmation gate.
        if let Some(pending) = ctx.get_object(keys::PENDING_INTENT).cloned() {
            ctx.remove(keys::PENDING_INTENT);
            let stored = pending
                .get("intent")
                .and_then(|v| v.as_str())
                .and_then(|s| Intent::from_str(s).ok());
            match (intent, stored) {
                (Intent::Affirmation, Some(stored)) => {
                    let expires = turn.now + Duration::seconds(self.config.confirmation_ttl_secs);
                    ctx.set(
                        keys::CONFIRMED_INTENT,
                        json!({"intent": stored.to_string(), "expires_at": iso(expires)}),
                    );
                    intent = stored;
                }
                (Intent::Negation, _) => {
                    ctx.set(keys::LAST_INTENT, intent.to_string());
                    return Ok(Some(
                        "No problem - what can I help you with instead?".to_string(),
                    ));
                }
                // Driver changed the subject; the classified intent stands.
                _ => {}
            }
        } else if self.needs_confirmation(turn, ctx, intent) {
            let concern = intent.concern().unwrap_or(ConcernType::CarProblem);
            let expires = turn.now + Duration::seconds(self.config.confirmation_ttl_secs);
            ctx.set(
                keys::PENDING_INTENT,
                json!({"intent": intent.to_string(), "expires_at": iso(expires)}),
            );
            ctx.set(keys::LAST_INTENT, intent.to_string());
            return Ok(Some(format!(
                "Just to make sure I log this right - are you telling me about {}? \
                 Reply 1 for yes or 2 for no.",
                concern_label(concern)
            )));
        }

        debug!(%intent, wa_id = turn.wa_id, "dispatching");
        let reply = self.route(intent, turn, ctx).await?;
        ctx.set(keys::LAST_INTENT, intent.to_string());
        Ok(reply)
    }

    async fn route(
        &self,
        intent: Intent,
        turn: &Turn<'_>,
        ctx: &mut DriverContext,
    ) -> Result<Option<String>, DineoError> {
        match intent {
            // KPI family.
            Intent::PerformanceSummary
            | Intent::ProgressUpdate
            | Intent::DailyTarget
            | Intent::AcceptanceRate
            | Intent::EarningsPerHour
            | Intent::TripCount
            | Intent::HotspotSummary
            | Intent::TopDriverTips => kpi::reply(self, intent, turn, ctx).await.map(Some),

            // Concern machines.
            Intent::MedicalPause => machines::medical::step(self, turn, ctx).await,
            Intent::NoVehicle => machines::no_vehicle::step(self, turn, ctx).await,
            Intent::CarProblem => machines::car_problem::step(self, turn, ctx).await,
            Intent::AccidentReport => machines::accident::step(self, turn, ctx).await,
            Intent::LowDemand => machines::low_demand::step(self, turn, ctx).await,
            Intent::CashRides => machines::cash_pop::step(self, turn, ctx).await,
            Intent::BalanceDispute => machines::balance_dispute::step(self, turn, ctx).await,
            Intent::VehicleRepossession => machines::repossession::step(self, turn, ctx).await,
            Intent::AccountSuspension => {
                machines::ops_ticket::step(self, turn, ctx, ConcernType::AccountSuspension).await
            }
            Intent::AppIssue => {
                machines::ops_ticket::step(self, turn, ctx, ConcernType::AppIssue).await
            }
            Intent::BrandingBonus => {
                machines::ops_ticket::step(self, turn, ctx, ConcernType::BrandingBonus).await
            }

            // Goal dialogue.
            Intent::GoalCommitment | Intent::TargetUpdate => {
                machines::goal::step(self, turn, ctx).await
            }

            // Transactional.
            Intent::AccountInquiry => transactional::account_inquiry(self, turn).await.map(Some),
            Intent::CurrentDateTime => Ok(Some(transactional::current_datetime(turn.now))),
            Intent::Greeting => Ok(Some(pick_variant(ctx, "greeting", banks::GREETING_PROMPTS))),
            Intent::Smalltalk => Ok(Some(transactional::smalltalk())),
            Intent::Identity => Ok(Some(transactional::identity(&self.config.assistant_name))),

            // Control tokens.
            Intent::Acknowledgement => Ok(Some(pick_variant(
                ctx,
                "ack",
                banks::ACKNOWLEDGEMENT_REPLIES,
            ))),
            Intent::Affirmation | Intent::Negation => {
                if machines::goal::has_pending(ctx) {
                    return machines::goal::step(self, turn, ctx).await;
                }
                if let Some(concern) = active_concern(ctx) {
                    return self.step_concern(concern, turn, ctx).await;
                }
                if intent == Intent::Affirmation {
                    Ok(Some(pick_variant(ctx, "ack", banks::ACKNOWLEDGEMENT_REPLIES)))
                } else {
                    Ok(Some("No problem. Anything else I can help with?".to_string()))
                }
            }
            Intent::ResolutionConfirmed => {
                if let Some(concern) = active_concern(ctx) {
                    return self.step_concern(concern, turn, ctx).await;
                }
                Ok(Some(
                    "Glad to hear it's sorted. Shout if anything else comes up.".to_string(),
                ))
            }
            Intent::VoiceUnavailable => Ok(Some(pick_variant(
                ctx,
                "voice",
                banks::VOICE_UNAVAILABLE,
            ))),

            // Handled before routing; repeated here to keep the match total.
            Intent::OptIn | Intent::OptOut => Ok(None),

            Intent::Clarify | Intent::Unknown => {
                if machines::goal::has_pending(ctx) {
                    return machines::goal::step(self, turn, ctx).await;
                }
                if let Some(concern) = active_concern(ctx) {
                    return self.step_concern(concern, turn, ctx).await;
                }
                if intent == Intent::Clarify {
                    Ok(Some(pick_variant(ctx, "clarify", banks::CLARIFY_PROMPTS)))
                } else {
                    Ok(Some(pick_variant(ctx, "unknown", banks::UNKNOWN_FALLBACKS)))
                }
            }
        }
    }

    /// Continue the active concern's machine with a turn that classified as
    /// a control token or free text.
    pub(crate) async fn step_concern(
        &self,
        concern: ConcernType,
        turn: &Turn<'_>,
        ctx: &mut DriverContext,
    ) -> Result<Option<String>, DineoError> {
        match concern {
            ConcernType::Medical => machines::medical::step(self, turn, ctx).await,
            ConcernType::NoVehicle => machines::no_vehicle::step(self, turn, ctx).await,
            ConcernType::Repossession => machines::repossession::step(self, turn, ctx).await,
            ConcernType::Accident => machines::accident::step(self, turn, ctx).await,
            ConcernType::CarProblem => machines::car_problem::step(self, turn, ctx).await,
            ConcernType::CashPop => machines::cash_pop::step(self, turn, ctx).await,
            ConcernType::BalanceDispute | ConcernType::FinanceFollowup => {
                machines::balance_dispute::step(self, turn, ctx).await
            }
            ConcernType::LowDemand => machines::low_demand::step(self, turn, ctx).await,
            ConcernType::AccountSuspension
            | ConcernType::AppIssue
            | ConcernType::BrandingBonus => machines::ops_ticket::step(self, turn, ctx, concern).await,
        }
    }

    /// Gate short, ticket-creating messages behind a yes/no confirmation.
    fn needs_confirmation(&self, turn: &Turn<'_>, ctx: &DriverContext, intent: Intent) -> bool {
        let Some(concern) = intent.concern() else {
            return false;
        };
        if !matches!(turn.kind, MessageKind::Text(_)) {
            return false;
        }
        if ctx.contains(concern.context_key()) {
            return false;
        }
        if turn.text().split_whitespace().count() > 2 {
            return false;
        }
        // A recent confirmation of the same intent skips the gate.
        if let Some(confirmed) = ctx.get_object(keys::CONFIRMED_INTENT) {
            let same = confirmed.get("intent").and_then(|v| v.as_str())
                == Some(intent.to_string().as_str());
            let live = confirmed
                .get("expires_at")
                .and_then(|v| v.as_str())
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .is_some_and(|t| t > turn.now);
            if same && live {
                return false;
            }
        }
        true
    }

    /// Drop context markers that no longer correspond to live state: blocks
    /// whose ticket an admin has closed, expired POP markers, expired gates.
    async fn purge_stale_state(
        &self,
        ctx: &mut DriverContext,
        now: DateTime<FixedOffset>,
    ) -> Result<(), DineoError> {
        if let Some(concern) = active_concern(ctx) {
            let closed = match machines::ticket_id(&machines::block(ctx, concern)) {
                Some(id) => match self.tickets.get(id).await {
                    Ok(ticket) => ticket.is_closed(),
                    Err(DineoError::TicketNotFound { .. }) => true,
                    Err(e) => return Err(e),
                },
                None => true,
            };
            if closed {
                machines::clear(ctx, concern);
                if concern == ConcernType::CashPop {
                    ctx.remove(keys::POP_PENDING_CONFIRMATION);
                }
            }
        }

        for key in [
            keys::POP_PENDING_CONFIRMATION,
            keys::PENDING_INTENT,
            keys::CONFIRMED_INTENT,
        ] {
            let expired = ctx
                .get_object(key)
                .and_then(|obj| obj.get("expires_at"))
                .and_then(|v| v.as_str())
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .is_some_and(|t| t <= now);
            if expired {
                ctx.remove(key);
            }
        }
        Ok(())
    }
}

/// The concern the context marks active, if any.
pub(crate) fn active_concern(ctx: &DriverContext) -> Option<ConcernType> {
    ctx.get_object(keys::ACTIVE_CONCERN)
        .and_then(|obj| obj.get("type"))
        .and_then(|v| v.as_str())
        .and_then(|t| ConcernType::from_str(t).ok())
}

fn concern_label(concern: ConcernType) -> &'static str {
    match concern {
        ConcernType::Medical => "a medical issue",
        ConcernType::NoVehicle => "being without a vehicle",
        ConcernType::Repossession => "your car being repossessed",
        ConcernType::Accident => "an accident",
        ConcernType::CarProblem => "a problem with the car",
        ConcernType::CashPop => "cash rides or a payment you made",
        ConcernType::BalanceDispute => "a problem with your balance",
        ConcernType::LowDemand => "low demand in your area",
        ConcernType::AccountSuspension => "your account being suspended",
        ConcernType::AppIssue => "a problem with the app",
        ConcernType::BrandingBonus => "the branding bonus",
        ConcernType::FinanceFollowup => "a finance follow-up",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{dispatcher, turn as text_turn};

    #[tokio::test]
    async fn greeting_routes_to_prompt_bank() {
        let (d, _adapter, _dir) = dispatcher().await;
        let mut ctx = DriverContext::new();
        let kind = MessageKind::Text("Hi".into());
        let reply = d
            .dispatch(&text_turn(&kind, Intent::Greeting), &mut ctx)
            .await
            .unwrap()
            .unwrap();
        assert!(banks::GREETING_PROMPTS.contains(&reply.as_str()));
        assert_eq!(ctx.get_str(keys::LAST_INTENT), Some("greeting"));
    }

    #[tokio::test]
    async fn account_inquiry_names_portal_and_personal_code() {
        let (d, _adapter, _dir) = dispatcher().await;
        let mut ctx = DriverContext::new();
        let kind = MessageKind::Text("what is my balance".into());
        let reply = d
            .dispatch(&text_turn(&kind, Intent::AccountInquiry), &mut ctx)
            .await
            .unwrap()
            .unwrap();
        assert!(reply.contains(&d.config.login_url));
        assert!(reply.contains("personal code"));
    }

    #[tokio::test]
    async fn short_concern_message_is_gated_then_confirmed() {
        let (d, _adapter, _dir) = dispatcher().await;
        let mut ctx = DriverContext::new();

        let kind = MessageKind::Text("accident".into());
        let reply = d
            .dispatch(&text_turn(&kind, Intent::AccidentReport), &mut ctx)
            .await
            .unwrap()
            .unwrap();
        assert!(reply.contains("Reply 1 for yes"));
        assert!(ctx.contains(keys::PENDING_INTENT));

        // "1" resolves through the gate into the accident machine.
        let yes = MessageKind::Text("1".into());
        let reply = d
            .dispatch(&text_turn(&yes, Intent::Affirmation), &mut ctx)
            .await
            .unwrap()
            .unwrap();
        assert!(reply.contains("112"), "{reply}");
        assert!(!ctx.contains(keys::PENDING_INTENT));
        assert!(ctx.contains(keys::CONFIRMED_INTENT));
        assert!(ctx.contains(ConcernType::Accident.context_key()));
    }

    #[tokio::test]
    async fn gate_negation_clears_pending() {
        let (d, _adapter, _dir) = dispatcher().await;
        let mut ctx = DriverContext::new();
        let kind = MessageKind::Text("repossessed".into());
        d.dispatch(&text_turn(&kind, Intent::VehicleRepossession), &mut ctx)
            .await
            .unwrap();

        let no = MessageKind::Text("2".into());
        let reply = d
            .dispatch(&text_turn(&no, Intent::Negation), &mut ctx)
            .await
            .unwrap()
            .unwrap();
        assert!(reply.contains("instead"));
        assert!(!ctx.contains(keys::PENDING_INTENT));
        assert!(!ctx.contains(ConcernType::Repossession.context_key()));
    }

    #[tokio::test]
    async fn repeat_opt_out_is_silent() {
        let (d, _adapter, _dir) = dispatcher().await;
        let mut ctx = DriverContext::new();
        let kind = MessageKind::Text("stop".into());
        let first = d
            .dispatch(&text_turn(&kind, Intent::OptOut), &mut ctx)
            .await
            .unwrap();
        assert!(first.is_some());
        assert!(ctx.opted_out());

        let second = d
            .dispatch(&text_turn(&kind, Intent::OptOut), &mut ctx)
            .await
            .unwrap();
        assert!(second.is_none());

        let start = MessageKind::Text("start".into());
        let back = d
            .dispatch(&text_turn(&start, Intent::OptIn), &mut ctx)
            .await
            .unwrap();
        assert!(back.is_some());
        assert!(!ctx.opted_out());
    }

    #[tokio::test]
    async fn acknowledgement_never_touches_active_concern() {
        let (d, _adapter, _dir) = dispatcher().await;
        let mut ctx = DriverContext::new();
        let open = MessageKind::Text("my car broke down on the highway".into());
        d.dispatch(&text_turn(&open, Intent::CarProblem), &mut ctx)
            .await
            .unwrap();
        let block_before = ctx.get_object(ConcernType::CarProblem.context_key()).cloned();
        assert!(block_before.is_some());

        let thanks = MessageKind::Text("thanks".into());
        d.dispatch(&text_turn(&thanks, Intent::Acknowledgement), &mut ctx)
            .await
            .unwrap();
        assert_eq!(
            ctx.get_object(ConcernType::CarProblem.context_key()).cloned(),
            block_before
        );
    }

    #[tokio::test]
    async fn closed_ticket_block_is_purged_next_turn() {
        let (d, _adapter, _dir) = dispatcher().await;
        let mut ctx = DriverContext::new();
        let open = MessageKind::Text("the app keeps crashing on me".into());
        d.dispatch(&text_turn(&open, Intent::AppIssue), &mut ctx)
            .await
            .unwrap();
        let id = machines::ticket_id(&machines::block(&ctx, ConcernType::AppIssue)).unwrap();
        d.tickets.update_status(id, "closed", None, None).await.unwrap();

        let hello = MessageKind::Text("Hi".into());
        d.dispatch(&text_turn(&hello, Intent::Greeting), &mut ctx)
            .await
            .unwrap();
        assert!(!ctx.contains(ConcernType::AppIssue.context_key()));
        assert!(!ctx.contains(keys::ACTIVE_CONCERN));
    }
}
