use crate::column::{Column, DataType};
use crate::record::{Record, Value};
use crate::time_grouping::{group_by_formatted_time_unit, EMPTY_VALUE};

use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub id: usize,
    pub parent: Option<usize>,
    /// Group-by column of this tree level; empty for the root.
    pub name: String,
    pub value: Value,
    pub count: u64,
    /// Index of the top-level branch the node belongs to, 0 for the root.
    pub group: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphLink {
    pub source: usize,
    pub target: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphData {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
}

struct TreeNode {
    name: String,
    value: Value,
    count: u64,
    children: IndexMap<Value, TreeNode>,
}

impl TreeNode {
    fn new(name: String, value: Value) -> Self {
        Self {
            name,
            value,
            count: 0,
            children: IndexMap::new(),
        }
    }
}

/// Builds the node/link view of `rows` nested by `group_by_columns`.
///
/// TIME columns are grouped by their formatted bucket, missing and null
/// values are collected under [`EMPTY_VALUE`]. Nodes are listed depth first,
/// siblings in order of first appearance.
pub fn create_graph_data(mut rows: Vec<Record>, group_by_columns: &[Column]) -> GraphData {
    let names: Vec<String> = group_by_columns
        .iter()
        .map(|column| {
            if column.data_type == DataType::Time {
                group_by_formatted_time_unit(column, &mut rows).name
            } else {
                column.name.clone()
            }
        })
        .collect();

    let mut root = TreeNode::new(String::new(), Value::str(""));
    for row in rows.iter() {
        root.count += 1;
        let mut node = &mut root;
        for name in names.iter() {
            let value = match row.get(name) {
                None | Some(Value::Null) => Value::str(EMPTY_VALUE),
                Some(v) => v.clone(),
            };
            node = node
                .children
                .entry(value.clone())
                .or_insert_with(|| TreeNode::new(name.clone(), value));
            node.count += 1;
        }
    }

    let mut data = GraphData::default();
    push_node(&mut data, &root, None, 0);
    for (idx, branch) in root.children.values().enumerate() {
        flatten(&mut data, branch, 0, idx + 1);
    }
    data
}

fn push_node(data: &mut GraphData, node: &TreeNode, parent: Option<usize>, group: usize) -> usize {
    let id = data.nodes.len();
    data.nodes.push(GraphNode {
        id,
        parent,
        name: node.name.clone(),
        value: node.value.clone(),
        count: node.count,
        group,
    });
    if let Some(source) = parent {
        data.links.push(GraphLink { source, target: id });
    }
    id
}

fn flatten(data: &mut GraphData, node: &TreeNode, parent: usize, group: usize) {
    let id = push_node(data, node, Some(parent), group);
    for child in node.children.values() {
        flatten(data, child, id, group);
    }
}

#[cfg(test)]
use crate::record::record;

#[cfg(test)]
fn rows() -> Vec<Record> {
    vec![
        record(vec![("Host", Value::from("h1")), ("Level", Value::from("INFO"))]),
        record(vec![("Host", Value::from("h1")), ("Level", Value::from("WARN"))]),
        record(vec![("Host", Value::from("h2")), ("Level", Value::from("INFO"))]),
        record(vec![("Host", Value::from("h1")), ("Level", Value::Null)]),
        record(vec![("Host", Value::from("h2"))]),
    ]
}

#[test]
fn test_tree_nodes_and_links() {
    let columns = vec![
        Column::new("Host", DataType::Text),
        Column::new("Level", DataType::Text),
    ];
    let data = create_graph_data(rows(), &columns);

    let summary: Vec<(Option<usize>, &str, String, u64, usize)> = data
        .nodes
        .iter()
        .map(|n| (n.parent, n.name.as_str(), n.value.to_string(), n.count, n.group))
        .collect();
    assert_eq!(
        summary,
        vec![
            (None, "", "".to_owned(), 5, 0),
            (Some(0), "Host", "h1".to_owned(), 3, 1),
            (Some(1), "Level", "INFO".to_owned(), 1, 1),
            (Some(1), "Level", "WARN".to_owned(), 1, 1),
            (Some(1), "Level", EMPTY_VALUE.to_owned(), 1, 1),
            (Some(0), "Host", "h2".to_owned(), 2, 2),
            (Some(5), "Level", "INFO".to_owned(), 1, 2),
            (Some(5), "Level", EMPTY_VALUE.to_owned(), 1, 2),
        ]
    );
    assert_eq!(data.links.len(), data.nodes.len() - 1);
    for link in data.links.iter() {
        assert_eq!(data.nodes[link.target].parent, Some(link.source));
    }
}

#[test]
fn test_no_grouping_is_root_only() {
    let data = create_graph_data(rows(), &[]);
    assert_eq!(data.nodes.len(), 1);
    assert_eq!(data.nodes[0].count, 5);
    assert!(data.links.is_empty());
}
