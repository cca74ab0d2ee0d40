use std::path::Path;

use qrun_quant::ensure_file_exists;
use serde::Serialize;
use tract_core::internal::*;

/// One label per line, in output index order.
pub fn load_labels(path: impl AsRef<Path>) -> TractResult<Vec<String>> {
    let path = path.as_ref();
    ensure_file_exists(path)?;
    Ok(fs_err::read_to_string(path)?.lines().map(|s| s.trim_end().to_string()).collect())
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Prediction {
    pub index: usize,
    pub label: Option<String>,
    pub score: f32,
}

/// The `k` best scores, best first. Ties keep index order.
pub fn top_k(scores: &[f32], k: usize, labels: Option<&[String]>) -> Vec<Prediction> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then(a.cmp(&b)));
    order
        .into_iter()
        .take(k)
        .map(|index| Prediction {
            index,
            label: labels.and_then(|l| l.get(index)).cloned(),
            score: scores[index],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn best_first() {
        let labels = vec!["background".to_string(), "beer".into(), "can".into()];
        let top = top_k(&[0.1, 0.7, 0.2], 2, Some(labels.as_slice()));
        assert_eq!(top[0], Prediction { index: 1, label: Some("beer".into()), score: 0.7 });
        assert_eq!(top[1].index, 2);
        assert_eq!(top.len(), 2);
    }

    #[test]
    fn ties_and_missing_labels() {
        let top = top_k(&[0.5, 0.5, 0.9], 5, Some(&["a".to_string()][..]));
        assert_eq!(top.iter().map(|p| p.index).collect::<Vec<_>>(), vec![2, 0, 1]);
        assert_eq!(top[0].label, None);
        assert_eq!(top[1].label.as_deref(), Some("a"));
    }

    #[test]
    fn labels_file() -> TractResult<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("labels.txt");
        fs_err::write(&path, "uniform\r\nbeer\n")?;
        assert_eq!(load_labels(&path)?, vec!["uniform".to_string(), "beer".to_string()]);
        Ok(())
    }
}
