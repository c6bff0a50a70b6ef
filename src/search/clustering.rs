//! Stage 7 (news mode only): clusters source titles by Jaccard similarity
//! over stopword-filtered, lowercased, diacritic-stripped tokens.

use std::collections::HashSet;

const SIMILARITY_THRESHOLD: f64 = 0.3;

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "of", "in", "on", "to", "for", "and", "is", "at", "by", "with", "as", "says", "after", "over",
];

fn strip_diacritics(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        other => other,
    }
}

fn tokenize(title: &str) -> HashSet<String> {
    title
        .to_ascii_lowercase()
        .chars()
        .map(strip_diacritics)
        .collect::<String>()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty() && !STOPWORDS.contains(t))
        .map(|t| t.to_string())
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoryCluster {
    pub representative_index: usize,
    pub member_indices: Vec<usize>,
}

/// Clusters titles in input order. The first title to reach similarity
/// `>= 0.3` against a cluster's representative joins that cluster;
/// otherwise it starts a new one with itself as representative.
pub fn cluster_titles(titles: &[String]) -> Vec<StoryCluster> {
    let tokens: Vec<HashSet<String>> = titles.iter().map(|t| tokenize(t)).collect();
    let mut clusters: Vec<StoryCluster> = Vec::new();

    for (index, token_set) in tokens.iter().enumerate() {
        let mut joined = None;
        for cluster in &mut clusters {
            let rep_tokens = &tokens[cluster.representative_index];
            if jaccard(rep_tokens, token_set) >= SIMILARITY_THRESHOLD {
                joined = Some(cluster);
                break;
            }
        }
        match joined {
            Some(cluster) => cluster.member_indices.push(index),
            None => clusters.push(StoryCluster { representative_index: index, member_indices: vec![index] }),
        }
    }
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn similar_titles_cluster_together() {
        let titles = vec![
            "Elon Musk announces new Tesla factory".to_string(),
            "Tesla factory announcement by Elon Musk".to_string(),
        ];
        let clusters = cluster_titles(&titles);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].member_indices, vec![0, 1]);
    }

    #[test]
    fn dissimilar_titles_form_separate_clusters() {
        let titles = vec!["Stock market rallies today".to_string(), "Local bakery wins award".to_string()];
        let clusters = cluster_titles(&titles);
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn diacritics_are_folded_before_comparison() {
        let titles = vec!["Café opens in Montréal".to_string(), "Cafe opens in Montreal".to_string()];
        let clusters = cluster_titles(&titles);
        assert_eq!(clusters.len(), 1);
    }
}
