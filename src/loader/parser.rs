use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

use crate::api::topology_dto::TopologyDto;
use crate::domain::graph::Graph;
use crate::error::{Error, Result};

/// Parses a JSON file into a given type `T`.
///
/// Errors are automatically converted into `crate::error::Error` variants:
/// - `Error::IoError` if the file cannot be read.
/// - `Error::DeserializationError` if the JSON is malformed.
pub fn parse_json_file<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let data = fs::read_to_string(file_path)?;
    let parsed_data: T = serde_json::from_str(&data)?;
    Ok(parsed_data)
}

/// Reads a whitespace separated edge list, one `source target [length]` triple per line.
///
/// Lines starting with `#` or `%` are comments. A missing length means unit length.
pub fn parse_edge_list(data: &str) -> Result<Graph> {
    let mut edges: Vec<(String, String, f64)> = Vec::new();

    for (index, line) in data.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('%') {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        let length = match fields.as_slice() {
            [_, _] => 1.0,
            [_, _, length] => length
                .parse::<f64>()
                .map_err(|e| Error::MalformedInput { line: index + 1, reason: format!("invalid length '{}': {}", length, e) })?,
            _ => {
                return Err(Error::MalformedInput { line: index + 1, reason: format!("expected 2 or 3 fields, found {}", fields.len()) });
            }
        };
        edges.push((fields[0].to_string(), fields[1].to_string(), length));
    }

    Graph::from_weighted_edges(Vec::new(), edges)
}

pub fn read_edge_list(file_path: &Path) -> Result<Graph> {
    let data = fs::read_to_string(file_path)?;
    parse_edge_list(&data)
}

/// Loads a topology from a `.json` file or, for any other extension, an edge list.
pub fn load_topology(file_path: &Path) -> Result<Graph> {
    let is_json = file_path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let graph = if is_json {
        let dto: TopologyDto = parse_json_file(file_path)?;
        log::debug!("Topology '{}' parsed from JSON.", dto.name);
        dto.into_graph()?
    } else {
        read_edge_list(file_path)?
    };

    log::info!("Loaded topology {} with {} vertices and {} edges.", file_path.display(), graph.vertex_count(), graph.edge_count());
    Ok(graph)
}

/// Parses a subgraph corpus as written by the enumeration: one subgraph per line, labels separated by spaces.
pub fn parse_subgraph_corpus(data: &str) -> Vec<Vec<String>> {
    data.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.split_whitespace().map(str::to_string).collect())
        .collect()
}

pub fn read_subgraph_corpus(file_path: &Path) -> Result<Vec<Vec<String>>> {
    let data = fs::read_to_string(file_path)?;
    Ok(parse_subgraph_corpus(&data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_list_with_comments_and_lengths() {
        let data = "# ring\n% generated\n0 1\n1 2 2.5\n\n2 0\n";
        let graph = parse_edge_list(data).unwrap();
        assert_eq!(graph.vertex_count(), 3);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.length(graph.vertex("1").unwrap(), graph.vertex("2").unwrap()), Some(2.5));
    }

    #[test]
    fn test_edge_list_rejects_bad_lines() {
        assert!(matches!(parse_edge_list("0 1\n0\n"), Err(Error::MalformedInput { line: 2, .. })));
        assert!(matches!(parse_edge_list("0 1 fast\n"), Err(Error::MalformedInput { line: 1, .. })));
    }

    #[test]
    fn test_corpus_lines() {
        let corpus = parse_subgraph_corpus("0 1 2\n\n1 2 3\n");
        assert_eq!(corpus, vec![vec!["0", "1", "2"], vec!["1", "2", "3"]]);
    }
}
