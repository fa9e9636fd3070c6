use std::time::Duration;

use crate::app::store::AgentId;

pub(crate) const REPLY_DELAY: Duration = Duration::from_millis(800);

pub(crate) fn reply_text(name: &str, title: &str, received: &str) -> String {
    format!("Thanks for your message! I'm {name}, your {title}. I received: \"{received}\"")
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DueReply {
    pub agent_id: AgentId,
    pub content: String,
}

#[derive(Debug, Clone)]
struct ScheduledReply {
    due_at_seconds: f64,
    reply: DueReply,
}

/// One-shot agent replies keyed to the scene clock.
#[derive(Debug, Default)]
pub(crate) struct ReplyScheduler {
    pending: Vec<ScheduledReply>,
}

impl ReplyScheduler {
    pub(crate) fn schedule(&mut self, agent_id: AgentId, content: String, now_seconds: f64) {
        self.pending.push(ScheduledReply {
            due_at_seconds: now_seconds + REPLY_DELAY.as_secs_f64(),
            reply: DueReply { agent_id, content },
        });
    }

    /// Returns how many replies were dropped.
    pub(crate) fn cancel_for_agent(&mut self, agent_id: &AgentId) -> usize {
        let before = self.pending.len();
        self.pending
            .retain(|scheduled| &scheduled.reply.agent_id != agent_id);
        before - self.pending.len()
    }

    /// Due replies in scheduling order.
    pub(crate) fn drain_due(&mut self, now_seconds: f64) -> Vec<DueReply> {
        let (due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|scheduled| scheduled.due_at_seconds <= now_seconds);
        self.pending = waiting;
        due.into_iter().map(|scheduled| scheduled.reply).collect()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_text_matches_chat_format() {
        assert_eq!(
            reply_text("Ada", "Analyst", "hi there"),
            "Thanks for your message! I'm Ada, your Analyst. I received: \"hi there\""
        );
    }

    #[test]
    fn replies_fire_after_delay_in_order() {
        let mut scheduler = ReplyScheduler::default();
        let a = AgentId::from_raw("agent-a");
        scheduler.schedule(a.clone(), "one".to_string(), 0.0);
        scheduler.schedule(a.clone(), "two".to_string(), 0.1);

        assert!(scheduler.drain_due(0.79).is_empty());
        let due = scheduler.drain_due(0.85);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].content, "one");

        let due = scheduler.drain_due(1.0);
        assert_eq!(due[0].content, "two");
        assert_eq!(scheduler.len(), 0);
    }

    #[test]
    fn cancel_only_drops_that_agents_replies() {
        let mut scheduler = ReplyScheduler::default();
        let a = AgentId::from_raw("agent-a");
        let b = AgentId::from_raw("agent-b");
        scheduler.schedule(a.clone(), "x".to_string(), 0.0);
        scheduler.schedule(b.clone(), "y".to_string(), 0.0);

        assert_eq!(scheduler.cancel_for_agent(&a), 1);
        let due = scheduler.drain_due(5.0);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].agent_id, b);
    }
}
