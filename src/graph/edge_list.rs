//! Plain-text edge lists.
//!
//! One edge per line: `src dst [weight]`, whitespace separated. A missing
//! weight means `1.0`. Blank lines and anything after `#` are ignored.

use std::io::BufRead;

use super::fragment::GlobalId;
use crate::error::{Error, Result};

/// A parsed edge list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeList {
    /// Every vertex mentioned, in ascending order without duplicates.
    pub vertices: Vec<GlobalId>,
    /// `(src, dst, weight)` triples in file order.
    pub edges: Vec<(GlobalId, GlobalId, f64)>,
}

impl EdgeList {
    /// Parses an edge list from `reader`.
    pub fn read<R: BufRead>(reader: R) -> Result<Self> {
        let mut edges = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let content = line.split('#').next().unwrap_or("").trim();
            if content.is_empty() {
                continue;
            }
            edges.push(parse_line(content, i + 1)?);
        }

        let mut vertices: Vec<GlobalId> = edges.iter().flat_map(|&(s, d, _)| [s, d]).collect();
        vertices.sort_unstable();
        vertices.dedup();
        Ok(Self { vertices, edges })
    }
}

fn parse_line(content: &str, line: usize) -> Result<(GlobalId, GlobalId, f64)> {
    let bad = |reason: String| Error::EdgeList { line, reason };
    let mut fields = content.split_whitespace();
    let mut id = |what: &str| -> Result<GlobalId> {
        let field = fields.next().ok_or_else(|| bad(format!("missing {what}")))?;
        field
            .parse()
            .map_err(|e| bad(format!("{what} {field:?}: {e}")))
    };
    let src = id("source")?;
    let dst = id("target")?;
    let weight = match fields.next() {
        None => 1.0,
        Some(field) => field
            .parse::<f64>()
            .map_err(|e| bad(format!("weight {field:?}: {e}")))?,
    };
    if let Some(extra) = fields.next() {
        return Err(bad(format!("unexpected field {extra:?}")));
    }
    Ok((src, dst, weight))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_weights_comments_and_defaults() {
        let text = "# header\n0 1 2.5\n\n1 2   # unit weight\n2 0 0\n";
        let list = EdgeList::read(text.as_bytes()).unwrap();
        assert_eq!(list.edges, vec![(0, 1, 2.5), (1, 2, 1.0), (2, 0, 0.0)]);
        assert_eq!(list.vertices, vec![0, 1, 2]);
    }

    #[test]
    fn reports_line_numbers() {
        let err = EdgeList::read("0 1\n1 x\n".as_bytes()).unwrap_err();
        assert!(matches!(err, Error::EdgeList { line: 2, .. }));

        let err = EdgeList::read("0 1 1.0 9\n".as_bytes()).unwrap_err();
        assert!(matches!(err, Error::EdgeList { line: 1, .. }));

        let err = EdgeList::read("7\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("missing target"));
    }
}
