//! Partition ownership across consumer group rebalances.
//!
//! [`RebalanceState`] is owned by the consumer loop and updated from the
//! assignment and revocation events the message source reports. The loop
//! asks it whether a partition whose rewind failed has already moved to
//! another group member.

use std::collections::HashSet;

type TopicPartition = (String, i32);

/// Tracks the topic-partitions assigned to, and revoked from, this consumer.
#[derive(Debug, Clone, Default)]
pub struct RebalanceState {
    assigned: HashSet<TopicPartition>,
    revoked: HashSet<TopicPartition>,
    rebalance_count: u64,
}

impl RebalanceState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds newly assigned partitions.
    ///
    /// Assignment is incremental: partitions already owned stay owned.
    pub fn on_assign(&mut self, partitions: &[TopicPartition]) {
        for tp in partitions {
            self.revoked.remove(tp);
            self.assigned.insert(tp.clone());
        }
        self.rebalance_count += 1;
    }

    /// Drops revoked partitions.
    pub fn on_revoke(&mut self, partitions: &[TopicPartition]) {
        for tp in partitions {
            if self.assigned.remove(tp) {
                self.revoked.insert(tp.clone());
            }
        }
        self.rebalance_count += 1;
    }

    /// Number of partitions currently owned.
    #[must_use]
    pub fn assigned_count(&self) -> usize {
        self.assigned.len()
    }

    /// Number of assignment and revocation events seen.
    #[must_use]
    pub fn rebalance_count(&self) -> u64 {
        self.rebalance_count
    }

    /// Returns `true` if the partition is owned.
    #[must_use]
    pub fn is_assigned(&self, topic: &str, partition: i32) -> bool {
        self.assigned.contains(&(topic.to_string(), partition))
    }

    /// Returns `true` if the partition was owned and has since been revoked.
    ///
    /// A partition never seen in an assignment is not revoked: sources that
    /// do not report rebalances still own what they deliver.
    #[must_use]
    pub fn is_revoked(&self, topic: &str, partition: i32) -> bool {
        self.revoked.contains(&(topic.to_string(), partition))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_then_revoke() {
        let mut state = RebalanceState::new();
        state.on_assign(&[("PoESocial_stat".into(), 0), ("PoESocial_stat".into(), 1)]);
        assert!(state.is_assigned("PoESocial_stat", 0));
        assert!(state.is_assigned("PoESocial_stat", 1));

        state.on_revoke(&[("PoESocial_stat".into(), 0)]);
        assert!(!state.is_assigned("PoESocial_stat", 0));
        assert!(state.is_revoked("PoESocial_stat", 0));
        assert!(state.is_assigned("PoESocial_stat", 1));
        assert_eq!(state.rebalance_count(), 2);
    }

    #[test]
    fn test_assign_is_incremental() {
        let mut state = RebalanceState::new();
        state.on_assign(&[("a".into(), 0)]);
        state.on_assign(&[("b".into(), 0)]);
        assert_eq!(state.assigned_count(), 2);
    }

    #[test]
    fn test_reassignment_clears_revocation() {
        let mut state = RebalanceState::new();
        state.on_assign(&[("a".into(), 0)]);
        state.on_revoke(&[("a".into(), 0)]);
        state.on_assign(&[("a".into(), 0)]);
        assert!(state.is_assigned("a", 0));
        assert!(!state.is_revoked("a", 0));
    }

    #[test]
    fn test_unknown_partition_is_not_revoked() {
        let mut state = RebalanceState::new();
        state.on_revoke(&[("a".into(), 9)]);
        assert_eq!(state.assigned_count(), 0);
        assert!(!state.is_revoked("a", 9));
    }
}
