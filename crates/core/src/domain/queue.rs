// Print Queue Domain Model

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Queue identifier (user-assigned, unique)
pub type QueueName = String;

/// Page orientation policy for PDF rendering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// Let the renderer rotate each page to best fit the paper
    #[default]
    Automatic,
    Portrait,
    Landscape,
}

/// Print queue configuration
///
/// `paper_size` / `paper_source` hold a printer media identifier; `None` means
/// "use the printer default".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintQueue {
    pub name: QueueName,
    pub printer_name: String,

    #[serde(default)]
    pub raw_mode: bool,

    #[serde(default)]
    pub paper_size: Option<String>,

    #[serde(default)]
    pub paper_source: Option<String>,

    #[serde(default)]
    pub orientation: Orientation,
}

impl PrintQueue {
    pub fn new(name: impl Into<String>, printer_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            printer_name: printer_name.into(),
            raw_mode: false,
            paper_size: None,
            paper_source: None,
            orientation: Orientation::Automatic,
        }
    }

    pub fn raw(name: impl Into<String>, printer_name: impl Into<String>) -> Self {
        Self {
            raw_mode: true,
            ..Self::new(name, printer_name)
        }
    }
}

/// Immutable mapping from queue name to configuration, built once per monitor start
#[derive(Debug, Clone, Default)]
pub struct QueueTable {
    queues: HashMap<QueueName, PrintQueue>,
    order: Vec<QueueName>,
}

impl QueueTable {
    pub fn new(queues: impl IntoIterator<Item = PrintQueue>) -> Self {
        let mut table = Self::default();
        for queue in queues {
            if !table.queues.contains_key(&queue.name) {
                table.order.push(queue.name.clone());
            }
            table.queues.insert(queue.name.clone(), queue);
        }
        table
    }

    pub fn get(&self, name: &str) -> Option<&PrintQueue> {
        self.queues.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    /// Queue names in configuration order
    pub fn names(&self) -> &[QueueName] {
        &self.order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_table_keeps_configuration_order() {
        let table = QueueTable::new(vec![
            PrintQueue::new("LABELS", "Zebra"),
            PrintQueue::raw("RECEIPTS", "Epson"),
        ]);

        assert_eq!(table.len(), 2);
        assert_eq!(table.names(), &["LABELS".to_string(), "RECEIPTS".to_string()]);
        assert!(table.get("RECEIPTS").unwrap().raw_mode);
        assert!(table.get("UNKNOWN").is_none());
    }

    #[test]
    fn test_queue_defaults_deserialize() {
        let queue: PrintQueue =
            serde_json::from_str(r#"{"name":"A","printer_name":"P"}"#).unwrap();
        assert!(!queue.raw_mode);
        assert_eq!(queue.paper_size, None);
        assert_eq!(queue.orientation, Orientation::Automatic);
    }
}
