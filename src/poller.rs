//! Read cycle orchestration.
//!
//! A [`Poller`] is built once from the configured nodes: nodes are grouped by
//! metric name and every address is resolved up front. Points that fail to
//! resolve are logged and left out; the rest of their group is unaffected.
//!
//! Each call to [`Poller::run_cycle`] then walks every group:
//!
//! 1. split the group's points into batches of at most `max_items`
//! 2. read each batch through a [`ReadBatch`] implementation
//! 3. decode each item slot into the group's field map
//! 4. emit the field map through a [`MetricSink`] if it is not empty
//!
//! A failed batch drops only that batch's fields, and a failed item drops only
//! its own field. Neither aborts the cycle.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::address::{resolve, ResolvedPoint};
use crate::config::NodeSpec;
use crate::decode::{decode, slot_at, Value};
use crate::error::{item_error_description, Result, S7Error};
use crate::plan::{group_by_metric, plan, FieldPoint};
use crate::sink::MetricSink;

/// Field values of one record, keyed by field name.
pub type FieldMap = BTreeMap<String, Value>;

/// Raw result of one batch read.
#[derive(Debug, Default)]
pub struct BatchReadout {
    /// One 4-byte slot per requested point, in request order.
    pub data: Vec<u8>,
    /// Per-item failure, `None` for items that were read.
    pub item_errors: Vec<Option<S7Error>>,
}

/// Reads a batch of points in one request.
pub trait ReadBatch {
    /// Reads `points` and returns their slots.
    ///
    /// An `Err` fails the whole batch. Individual item failures are reported
    /// through [`BatchReadout::item_errors`].
    fn read_batch(&mut self, points: &[ResolvedPoint]) -> Result<BatchReadout>;
}

/// Resolved points sharing one record name.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedGroup {
    /// Record name.
    pub name: String,
    /// Points in configuration order.
    pub fields: Vec<FieldPoint>,
}

/// Counters of one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Records handed to the sink.
    pub groups_emitted: usize,
    /// Fields decoded across all records.
    pub fields_decoded: usize,
    /// Batches sent to the reader.
    pub batches: usize,
    /// Batches whose read failed as a whole.
    pub batches_failed: usize,
    /// Items the PLC answered with an error.
    pub items_failed: usize,
}

/// Resolves configured nodes once and runs read cycles over them.
#[derive(Debug, Clone)]
pub struct Poller {
    groups: Vec<ResolvedGroup>,
    max_items: usize,
    tags: BTreeMap<String, String>,
}

impl Poller {
    /// Groups and resolves `nodes`.
    ///
    /// Unresolvable nodes are logged and skipped; groups without any
    /// resolved point are dropped.
    ///
    /// # Errors
    ///
    /// Returns `S7Error::InvalidParameter` if `max_items` is 0.
    ///
    /// # Example
    ///
    /// ```
    /// use s7comm_poller::{NodeSpec, Poller};
    ///
    /// let nodes = vec![
    ///     NodeSpec {
    ///         metric: "tank".into(),
    ///         name: "level".into(),
    ///         address: "DB3.DBD0".into(),
    ///         data_type: "real".into(),
    ///     },
    ///     NodeSpec {
    ///         metric: "tank".into(),
    ///         name: "broken".into(),
    ///         address: "DB3".into(),
    ///         data_type: "real".into(),
    ///     },
    /// ];
    ///
    /// let poller = Poller::new(&nodes, 18).unwrap();
    /// assert_eq!(poller.groups().len(), 1);
    /// assert_eq!(poller.groups()[0].fields.len(), 1);
    /// ```
    pub fn new(nodes: &[NodeSpec], max_items: usize) -> Result<Self> {
        if max_items == 0 {
            return Err(S7Error::invalid_parameter(
                "max_items",
                "must be greater than 0",
            ));
        }

        let mut groups = Vec::new();
        for group in group_by_metric(nodes) {
            let mut fields = Vec::with_capacity(group.nodes.len());
            for node in group.nodes {
                match resolve(&node.address, &node.data_type) {
                    Ok(point) => fields.push(FieldPoint {
                        name: node.name.clone(),
                        address: node.address.clone(),
                        point,
                    }),
                    Err(e) if e.is_resolution_error() => warn!(
                        metric = group.name,
                        field = %node.name,
                        address = %node.address,
                        error = %e,
                        "skipping point"
                    ),
                    Err(e) => return Err(e),
                }
            }
            if fields.is_empty() {
                warn!(metric = group.name, "no resolvable points, group disabled");
                continue;
            }
            debug!(metric = group.name, points = fields.len(), "group resolved");
            groups.push(ResolvedGroup {
                name: group.name.to_string(),
                fields,
            });
        }

        Ok(Self {
            groups,
            max_items,
            tags: BTreeMap::new(),
        })
    }

    /// Sets the static tags attached to every record.
    pub fn with_tags(mut self, tags: BTreeMap<String, String>) -> Self {
        self.tags = tags;
        self
    }

    /// Returns the resolved groups.
    pub fn groups(&self) -> &[ResolvedGroup] {
        &self.groups
    }

    /// Runs one read cycle over all groups.
    pub fn run_cycle(&self, reader: &mut impl ReadBatch, sink: &mut impl MetricSink) -> CycleReport {
        let mut report = CycleReport::default();
        let tags = (!self.tags.is_empty()).then_some(&self.tags);

        for group in &self.groups {
            let fields = self.read_group(group, reader, &mut report);
            if fields.is_empty() {
                debug!(metric = %group.name, "nothing to emit");
                continue;
            }
            report.fields_decoded += fields.len();
            report.groups_emitted += 1;
            sink.emit(&group.name, &fields, tags);
        }
        report
    }

    fn read_group(
        &self,
        group: &ResolvedGroup,
        reader: &mut impl ReadBatch,
        report: &mut CycleReport,
    ) -> FieldMap {
        let mut fields = FieldMap::new();
        // max_items is checked in new()
        let Ok(batches) = plan(&group.fields, self.max_items) else {
            return fields;
        };

        for batch in batches {
            let points: Vec<ResolvedPoint> = batch.items.iter().map(|f| f.point).collect();
            report.batches += 1;
            let readout = match reader.read_batch(&points) {
                Ok(readout) => readout,
                Err(e) => {
                    report.batches_failed += 1;
                    warn!(
                        metric = %group.name,
                        batch_start = batch.start_offset,
                        items = batch.len(),
                        error = %e,
                        "batch read failed"
                    );
                    continue;
                }
            };

            for (i, field) in batch.items.iter().enumerate() {
                if let Some(Some(e)) = readout.item_errors.get(i) {
                    report.items_failed += 1;
                    let detail = match e {
                        S7Error::ItemError { return_code, .. } => item_error_description(*return_code),
                        _ => "",
                    };
                    warn!(
                        metric = %group.name,
                        field = %field.name,
                        address = %field.address,
                        batch_start = batch.start_offset,
                        error = %e,
                        detail,
                        "item read failed"
                    );
                    continue;
                }
                let Some(slot) = slot_at(&readout.data, i) else {
                    report.items_failed += 1;
                    warn!(
                        metric = %group.name,
                        field = %field.name,
                        batch_start = batch.start_offset,
                        "read buffer too short"
                    );
                    continue;
                };
                let value = decode(slot, field.point.kind, field.point.decode_bit());
                fields.insert(field.name.clone(), value);
            }
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::tests::RecordingSink;

    fn node(metric: &str, name: &str, address: &str, data_type: &str) -> NodeSpec {
        NodeSpec {
            metric: metric.to_string(),
            name: name.to_string(),
            address: address.to_string(),
            data_type: data_type.to_string(),
        }
    }

    /// Answers every item with its point's byte offset as a big-endian dword.
    #[derive(Default)]
    struct OffsetReader {
        calls: Vec<usize>,
        fail_call: Option<usize>,
    }

    impl ReadBatch for OffsetReader {
        fn read_batch(&mut self, points: &[ResolvedPoint]) -> Result<BatchReadout> {
            let call = self.calls.len();
            self.calls.push(points.len());
            if self.fail_call == Some(call) {
                return Err(S7Error::Timeout);
            }
            let mut data = Vec::with_capacity(points.len() * 4);
            for point in points {
                data.extend_from_slice(&u32::from(point.byte_offset).to_be_bytes());
            }
            Ok(BatchReadout {
                data,
                item_errors: points.iter().map(|_| None).collect(),
            })
        }
    }

    #[test]
    fn test_new_rejects_zero_limit() {
        assert!(Poller::new(&[], 0).is_err());
    }

    #[test]
    fn test_new_skips_unresolvable() {
        let nodes = vec![
            node("a", "x", "DB1", "word"),
            node("a", "y", "DB1.DBW2", "word"),
            node("b", "z", "DB1.DBW2", "lreal"),
        ];
        let poller = Poller::new(&nodes, 18).unwrap();
        assert_eq!(poller.groups().len(), 1);
        assert_eq!(poller.groups()[0].name, "a");
        assert_eq!(poller.groups()[0].fields[0].name, "y");
    }

    #[test]
    fn test_cycle_maps_fields_across_batches() {
        let nodes: Vec<NodeSpec> = (0..40)
            .map(|i| node("m", &format!("f{}", i), &format!("DB1.DBD{}", i), "dword"))
            .collect();
        let poller = Poller::new(&nodes, 18).unwrap();
        let mut reader = OffsetReader::default();
        let mut sink = RecordingSink::default();

        let report = poller.run_cycle(&mut reader, &mut sink);

        assert_eq!(reader.calls, vec![18, 18, 4]);
        assert_eq!(report.batches, 3);
        assert_eq!(report.batches_failed, 0);
        assert_eq!(report.groups_emitted, 1);
        assert_eq!(report.fields_decoded, 40);
        let (_, fields, _) = &sink.records[0];
        for i in 0..40u32 {
            assert_eq!(fields[&format!("f{}", i)], Value::UInt32(i));
        }
    }

    #[test]
    fn test_failed_batch_drops_only_its_fields() {
        let nodes: Vec<NodeSpec> = (0..20)
            .map(|i| node("m", &format!("f{}", i), &format!("MW{}", i), "word"))
            .collect();
        let poller = Poller::new(&nodes, 18).unwrap();
        let mut reader = OffsetReader {
            fail_call: Some(0),
            ..OffsetReader::default()
        };
        let mut sink = RecordingSink::default();

        let report = poller.run_cycle(&mut reader, &mut sink);

        assert_eq!(report.batches_failed, 1);
        assert_eq!(report.fields_decoded, 2);
        let (_, fields, _) = &sink.records[0];
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["f18"], Value::UInt16(0));
        assert!(!fields.contains_key("f0"));
    }

    #[test]
    fn test_item_error_drops_field() {
        struct PartialReader;
        impl ReadBatch for PartialReader {
            fn read_batch(&mut self, points: &[ResolvedPoint]) -> Result<BatchReadout> {
                let mut item_errors: Vec<Option<S7Error>> = points.iter().map(|_| None).collect();
                item_errors[0] = Some(S7Error::ItemError {
                    index: 0,
                    return_code: 0x0A,
                });
                Ok(BatchReadout {
                    data: vec![0x00, 0x00, 0x00, 0x00, 0x00, 0x07, 0x00, 0x00],
                    item_errors,
                })
            }
        }

        let nodes = vec![node("m", "a", "DB9.DBW0", "int"), node("m", "b", "DB1.DBW0", "int")];
        let poller = Poller::new(&nodes, 18).unwrap();
        let mut sink = RecordingSink::default();

        let report = poller.run_cycle(&mut PartialReader, &mut sink);

        assert_eq!(report.items_failed, 1);
        let (_, fields, _) = &sink.records[0];
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["b"], Value::Int16(7));
    }

    #[test]
    fn test_all_batches_failing_emits_nothing() {
        let nodes = vec![node("m", "a", "MB0", "byte")];
        let poller = Poller::new(&nodes, 18).unwrap();
        let mut reader = OffsetReader {
            fail_call: Some(0),
            ..OffsetReader::default()
        };
        let mut sink = RecordingSink::default();

        let report = poller.run_cycle(&mut reader, &mut sink);

        assert_eq!(report.groups_emitted, 0);
        assert!(sink.records.is_empty());
    }

    #[test]
    fn test_tags_attached() {
        let nodes = vec![node("m", "a", "MB0", "byte")];
        let tags = BTreeMap::from([("site".to_string(), "north".to_string())]);
        let poller = Poller::new(&nodes, 18).unwrap().with_tags(tags.clone());
        let mut sink = RecordingSink::default();

        poller.run_cycle(&mut OffsetReader::default(), &mut sink);

        assert_eq!(sink.records[0].2, Some(tags));
    }

    #[test]
    fn test_no_tags_passes_none() {
        let nodes = vec![node("m", "a", "MB0", "byte")];
        let poller = Poller::new(&nodes, 18).unwrap();
        let mut sink = RecordingSink::default();

        poller.run_cycle(&mut OffsetReader::default(), &mut sink);

        assert_eq!(sink.records[0].2, None);
    }
}
