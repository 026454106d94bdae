use crate::config::StageConfig;
use std::collections::BTreeMap;

/// Stage names grouped by level label.
///
/// Levels iterate in lexicographic label order (`l10` sorts before `l2`);
/// inside a level, stages keep their declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetLevelGraph {
    levels: BTreeMap<String, Vec<String>>,
}

impl DatasetLevelGraph {
    pub fn from_stages(stages: &[StageConfig]) -> Self {
        let mut graph = Self::default();
        for stage in stages {
            graph.insert(&stage.level, &stage.name);
        }
        graph
    }

    pub fn insert(&mut self, level: &str, stage: &str) {
        self.levels
            .entry(level.to_string())
            .or_default()
            .push(stage.to_string());
    }

    /// `(label, stages)` pairs in execution order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.levels
            .iter()
            .map(|(label, stages)| (label.as_str(), stages.as_slice()))
    }

    pub fn labels(&self) -> Vec<&str> {
        self.levels.keys().map(String::as_str).collect()
    }

    pub fn stage_count(&self) -> usize {
        self.levels.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_sort_as_strings_not_numbers() {
        let mut graph = DatasetLevelGraph::default();
        for label in ["l2", "l10", "l0", "l1"] {
            graph.insert(label, &format!("ds_{label}"));
        }
        assert_eq!(graph.labels(), vec!["l0", "l1", "l10", "l2"]);
    }

    #[test]
    fn stages_keep_declaration_order_within_level() {
        let mut graph = DatasetLevelGraph::default();
        graph.insert("l1", "b");
        graph.insert("l0", "z");
        graph.insert("l1", "a");
        let levels: Vec<_> = graph.iter().collect();
        assert_eq!(levels[1], ("l1", &["b".to_string(), "a".to_string()][..]));
        assert_eq!(graph.stage_count(), 3);
    }
}
