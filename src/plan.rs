//! Metric grouping and request batch planning.
//!
//! Configured nodes are grouped by metric name, first-seen order preserved.
//! Each group's resolved points are then split into batches of at most
//! [`MAX_ITEMS_PER_REQUEST`] items. A batch remembers the group-level index
//! of its first item (`start_offset`), so item `i` of a batch always maps back
//! to entry `start_offset + i` of the group.
//!
//! # Example
//!
//! ```
//! use s7comm_poller::plan::{plan, MAX_ITEMS_PER_REQUEST};
//!
//! let points: Vec<u32> = (0..40).collect();
//! let batches = plan(&points, MAX_ITEMS_PER_REQUEST).unwrap();
//!
//! assert_eq!(batches.len(), 3);
//! assert_eq!(batches[1].start_offset, 18);
//! assert_eq!(batches[2].items.len(), 4);
//! ```

use crate::address::ResolvedPoint;
use crate::config::NodeSpec;
use crate::error::{Result, S7Error};

/// Maximum number of items in one multi-item read request.
pub const MAX_ITEMS_PER_REQUEST: usize = 18;

/// A resolved point together with the field name it is reported under.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPoint {
    /// Field key in the emitted record.
    pub name: String,
    /// Address string as configured, kept for diagnostics.
    pub address: String,
    /// Protocol coordinates and decode kind.
    pub point: ResolvedPoint,
}

/// Configured nodes sharing one metric name.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricGroup<'a> {
    /// Record name.
    pub name: &'a str,
    /// Nodes in configuration order.
    pub nodes: Vec<&'a NodeSpec>,
}

/// Groups nodes by metric name.
///
/// Groups appear in the order their metric name is first seen, and nodes keep
/// their configuration order within a group.
pub fn group_by_metric(nodes: &[NodeSpec]) -> Vec<MetricGroup<'_>> {
    let mut groups: Vec<MetricGroup<'_>> = Vec::new();
    for node in nodes {
        match groups.iter_mut().find(|g| g.name == node.metric) {
            Some(group) => group.nodes.push(node),
            None => groups.push(MetricGroup {
                name: &node.metric,
                nodes: vec![node],
            }),
        }
    }
    groups
}

/// A contiguous run of a group's items sent as one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch<'a, T> {
    /// Group-level index of `items[0]`.
    pub start_offset: usize,
    /// Items of this batch.
    pub items: &'a [T],
}

impl<T> Batch<'_, T> {
    /// Returns the number of items in the batch.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns whether the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Splits a group's items into request batches.
///
/// Items are walked in order; the current batch is closed when it reaches
/// `max_items` or when it completes the group. Concatenating the batches
/// yields `items` unchanged, and only the last batch may be short.
///
/// # Errors
///
/// Returns `S7Error::InvalidParameter` if `max_items` is 0.
pub fn plan<T>(items: &[T], max_items: usize) -> Result<Vec<Batch<'_, T>>> {
    if max_items == 0 {
        return Err(S7Error::invalid_parameter(
            "max_items",
            "must be greater than 0",
        ));
    }

    let total = items.len();
    let mut batches = Vec::with_capacity(total.div_ceil(max_items));
    let mut offset = 0;
    let mut len = 0;
    for _ in items {
        len += 1;
        if len == max_items || offset + len == total {
            batches.push(Batch {
                start_offset: offset,
                items: &items[offset..offset + len],
            });
            offset += len;
            len = 0;
        }
    }
    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(metric: &str, name: &str) -> NodeSpec {
        NodeSpec {
            metric: metric.to_string(),
            name: name.to_string(),
            address: "DB1.DBW0".to_string(),
            data_type: "word".to_string(),
        }
    }

    #[test]
    fn test_plan_sizes() {
        for k in [0usize, 1, 17, 18, 19, 36, 37, 100] {
            let items: Vec<usize> = (0..k).collect();
            let batches = plan(&items, MAX_ITEMS_PER_REQUEST).unwrap();

            assert_eq!(batches.len(), k.div_ceil(MAX_ITEMS_PER_REQUEST), "k={}", k);
            for (i, batch) in batches.iter().enumerate() {
                assert!(batch.len() <= MAX_ITEMS_PER_REQUEST);
                if i + 1 < batches.len() {
                    assert_eq!(batch.len(), MAX_ITEMS_PER_REQUEST);
                }
            }

            let flattened: Vec<usize> = batches.iter().flat_map(|b| b.items.iter().copied()).collect();
            assert_eq!(flattened, items);
        }
    }

    #[test]
    fn test_plan_start_offsets() {
        let items: Vec<usize> = (0..40).collect();
        let batches = plan(&items, MAX_ITEMS_PER_REQUEST).unwrap();
        let offsets: Vec<usize> = batches.iter().map(|b| b.start_offset).collect();
        assert_eq!(offsets, vec![0, 18, 36]);
        for batch in &batches {
            for (i, item) in batch.items.iter().enumerate() {
                assert_eq!(*item, batch.start_offset + i);
            }
        }
    }

    #[test]
    fn test_plan_small_limit() {
        let items = ['a', 'b', 'c'];
        let batches = plan(&items, 1).unwrap();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[2].start_offset, 2);
        assert_eq!(batches[2].items, &['c']);
    }

    #[test]
    fn test_plan_zero_limit() {
        let items = [1, 2, 3];
        assert!(plan(&items, 0).is_err());
    }

    #[test]
    fn test_group_by_metric_preserves_order() {
        let nodes = vec![
            node("b", "b1"),
            node("a", "a1"),
            node("b", "b2"),
            node("c", "c1"),
            node("a", "a2"),
        ];
        let groups = group_by_metric(&nodes);

        let names: Vec<&str> = groups.iter().map(|g| g.name).collect();
        assert_eq!(names, vec!["b", "a", "c"]);

        let fields: Vec<&str> = groups[0].nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(fields, vec!["b1", "b2"]);
        let fields: Vec<&str> = groups[1].nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(fields, vec!["a1", "a2"]);
    }

    #[test]
    fn test_group_by_metric_empty() {
        assert!(group_by_metric(&[]).is_empty());
    }
}
