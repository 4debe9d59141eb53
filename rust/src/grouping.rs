// Sender-run grouping for message bubbles.

use serde::Serialize;

use crate::state::ChatMessage;

#[derive(uniffi::Record, Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct GroupPosition {
    pub first_in_group: bool,
    pub last_in_group: bool,
}

impl GroupPosition {
    /// A run shows its timestamp once, under its last message.
    pub fn shows_timestamp(&self) -> bool {
        self.last_in_group
    }
}

#[derive(uniffi::Record, Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct MessageRun {
    pub start: u32,
    pub len: u32,
    pub is_mine: bool,
}

/// Position of every message within its run of same-side messages.
///
/// Adjacency only looks at which side sent the message (mine vs. theirs), so
/// the input must already be in timeline order.
pub fn group_positions<T>(messages: &[T], is_mine: impl Fn(&T) -> bool) -> Vec<GroupPosition> {
    let sides: Vec<bool> = messages.iter().map(is_mine).collect();
    let last = sides.len().saturating_sub(1);
    sides
        .iter()
        .enumerate()
        .map(|(i, side)| GroupPosition {
            first_in_group: i == 0 || sides[i - 1] != *side,
            last_in_group: i == last || sides[i + 1] != *side,
        })
        .collect()
}

pub fn message_runs<T>(messages: &[T], is_mine: impl Fn(&T) -> bool) -> Vec<MessageRun> {
    let mut runs: Vec<MessageRun> = Vec::new();
    for (i, m) in messages.iter().enumerate() {
        let mine = is_mine(m);
        match runs.last_mut() {
            Some(run) if run.is_mine == mine => run.len += 1,
            _ => runs.push(MessageRun {
                start: i as u32,
                len: 1,
                is_mine: mine,
            }),
        }
    }
    runs
}

#[uniffi::export]
pub fn group_chat_messages(messages: Vec<ChatMessage>) -> Vec<GroupPosition> {
    group_positions(&messages, |m| m.is_mine)
}

#[uniffi::export]
pub fn chat_message_runs(messages: Vec<ChatMessage>) -> Vec<MessageRun> {
    message_runs(&messages, |m| m.is_mine)
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "alice";
    const B: &str = "bob";

    fn positions(senders: &[&str]) -> Vec<(bool, bool)> {
        group_positions(senders, |s| *s == A)
            .into_iter()
            .map(|p| (p.first_in_group, p.last_in_group))
            .collect()
    }

    #[test]
    fn runs_of_two_one_one() {
        let senders = [A, A, B, A];
        assert_eq!(
            positions(&senders),
            vec![(true, false), (false, true), (true, true), (true, true)]
        );

        let runs = message_runs(&senders, |s| *s == A);
        let lens: Vec<u32> = runs.iter().map(|r| r.len).collect();
        assert_eq!(lens, vec![2, 1, 1]);
        assert_eq!(runs[1].start, 2);
        assert!(!runs[1].is_mine);
    }

    #[test]
    fn empty_and_single_message() {
        let none: [&str; 0] = [];
        assert!(positions(&none).is_empty());
        assert!(message_runs(&none, |s| *s == A).is_empty());
        assert_eq!(positions(&[B]), vec![(true, true)]);
    }

    #[test]
    fn one_long_run_shows_single_timestamp() {
        let grouped = group_positions(&[A, A, A], |s| *s == A);
        let shown: Vec<bool> = grouped.iter().map(GroupPosition::shows_timestamp).collect();
        assert_eq!(shown, vec![false, false, true]);
    }

    #[test]
    fn grouping_is_deterministic() {
        let senders = [B, A, A, B, B, A];
        assert_eq!(positions(&senders), positions(&senders));
    }
}
