//! Queue assignment strategies

use super::QueueScope;
use crate::error::Result;
use crate::store::RelationshipRecord;

/// Maps each record to one or more worker queues
pub trait QueueDistributor<R>: Send {
    /// Call `consumer(record, queue)` once per target queue
    fn distribute(
        &mut self,
        record: &R,
        consumer: &mut dyn FnMut(&R, usize) -> Result<()>,
    ) -> Result<()>;

    /// What the worker on `queue` is responsible for
    fn scope_for(&self, queue: usize) -> QueueScope;
}

impl<R, D: QueueDistributor<R> + ?Sized> QueueDistributor<R> for Box<D> {
    fn distribute(
        &mut self,
        record: &R,
        consumer: &mut dyn FnMut(&R, usize) -> Result<()>,
    ) -> Result<()> {
        (**self).distribute(record, consumer)
    }

    fn scope_for(&self, queue: usize) -> QueueScope {
        (**self).scope_for(queue)
    }
}

/// Sends `records_per_queue` consecutive records to one queue, then moves
/// to the next: queue = `(records_seen / records_per_queue) mod queue_count`
#[derive(Debug, Clone)]
pub struct RoundRobinQueueDistributor {
    queue_count: usize,
    records_per_queue: u64,
    records_seen: u64,
}

impl RoundRobinQueueDistributor {
    /// Distributor over `queue_count` queues
    pub fn new(queue_count: usize, records_per_queue: u64) -> Self {
        Self {
            queue_count: queue_count.max(1),
            records_per_queue: records_per_queue.max(1),
            records_seen: 0,
        }
    }

    fn next_queue(&mut self) -> usize {
        let queue = (self.records_seen / self.records_per_queue) % self.queue_count as u64;
        self.records_seen += 1;
        queue as usize
    }
}

impl<R> QueueDistributor<R> for RoundRobinQueueDistributor {
    fn distribute(
        &mut self,
        record: &R,
        consumer: &mut dyn FnMut(&R, usize) -> Result<()>,
    ) -> Result<()> {
        let queue = self.next_queue();
        consumer(record, queue)
    }

    fn scope_for(&self, queue: usize) -> QueueScope {
        QueueScope::all(queue)
    }
}

/// Queue owning a node: contiguous id ranges, the last queue taking any
/// overflow (including the null reference)
pub fn queue_for_node(node: u64, nodes_per_queue: u64, queue_count: usize) -> usize {
    let last = queue_count.saturating_sub(1) as u64;
    (node / nodes_per_queue.max(1)).min(last) as usize
}

/// Sends a relationship to the queue owning each endpoint node
///
/// Both endpoints on one queue means one delivery; endpoints on different
/// queues means two, so every node's whole chain is seen by its owner.
#[derive(Debug, Clone)]
pub struct RelationshipNodesQueueDistributor {
    queue_count: usize,
    nodes_per_queue: u64,
}

impl RelationshipNodesQueueDistributor {
    /// Split node ids `0..node_high_id` evenly over `queue_count` queues
    pub fn new(queue_count: usize, node_high_id: u64) -> Self {
        let queue_count = queue_count.max(1);
        let nodes_per_queue = node_high_id.div_ceil(queue_count as u64).max(1);
        Self {
            queue_count,
            nodes_per_queue,
        }
    }

    /// Queue owning `node`
    pub fn queue_for(&self, node: u64) -> usize {
        queue_for_node(node, self.nodes_per_queue, self.queue_count)
    }
}

impl QueueDistributor<RelationshipRecord> for RelationshipNodesQueueDistributor {
    fn distribute(
        &mut self,
        record: &RelationshipRecord,
        consumer: &mut dyn FnMut(&RelationshipRecord, usize) -> Result<()>,
    ) -> Result<()> {
        let source = self.queue_for(record.first_node);
        let target = self.queue_for(record.second_node);
        consumer(record, source)?;
        if target != source {
            consumer(record, target)?;
        }
        Ok(())
    }

    fn scope_for(&self, queue: usize) -> QueueScope {
        QueueScope::node_range(queue, self.nodes_per_queue, self.queue_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Record;

    fn collect<R>(distributor: &mut dyn QueueDistributor<R>, record: &R) -> Vec<usize> {
        let mut queues = Vec::new();
        distributor
            .distribute(record, &mut |_, q| {
                queues.push(q);
                Ok(())
            })
            .unwrap();
        queues
    }

    #[test]
    fn test_round_robin_batches() {
        let mut distributor = RoundRobinQueueDistributor::new(3, 2);
        let queues: Vec<usize> = (0..8).map(|i| collect(&mut distributor, &i)[0]).collect();
        assert_eq!(queues, vec![0, 0, 1, 1, 2, 2, 0, 0]);
    }

    #[test]
    fn test_relationship_fan_out() {
        let mut distributor = RelationshipNodesQueueDistributor::new(4, 100);
        let mut rel = RelationshipRecord::unused(0);
        rel.first_node = 3;
        rel.second_node = 99;
        assert_eq!(collect(&mut distributor, &rel), vec![0, 3]);

        rel.second_node = 10;
        assert_eq!(collect(&mut distributor, &rel), vec![0]);
    }

    #[test]
    fn test_relationship_overflow_goes_to_last_queue() {
        let distributor = RelationshipNodesQueueDistributor::new(4, 100);
        assert_eq!(distributor.queue_for(5_000), 3);
        assert_eq!(distributor.queue_for(crate::store::NULL_REFERENCE), 3);
        assert!(
            QueueDistributor::<RelationshipRecord>::scope_for(&distributor, 3).owns_node(5_000)
        );
    }

    #[test]
    fn test_single_queue_relationships() {
        let mut distributor = RelationshipNodesQueueDistributor::new(1, 0);
        let mut rel = RelationshipRecord::unused(0);
        rel.first_node = 0;
        rel.second_node = 7;
        assert_eq!(collect(&mut distributor, &rel), vec![0]);
    }
}
