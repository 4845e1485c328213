//! StorylineWeaver: deterministic grouping of articles into storylines.
//!
//! The weave is a tiered union-find pass over the similarity graph:
//! - Near-duplicate edges are applied first and may merge any two groups.
//! - Continuation and related edges only attach unassigned articles (two
//!   unassigned endpoints seed a new group); they never fuse two groups
//!   that already exist, which keeps storylines tight on strong evidence
//!   and permissive on weak evidence for singleton attachment only.
//!
//! Edge order is fully deterministic: tier rank ascending, cosine
//! descending, then the normalized (src, dst) pair ascending. This is a
//! correctness requirement, not an optimization: in ambiguous cases the
//! order decides which group an article joins, and a re-run over an
//! unchanged graph must reproduce the identical partition.
//!
//! Two modes:
//! - **Rebuild** discards the previous partition and reweaves everything.
//! - **Incremental** seeds the union-find from the existing assignment,
//!   freezes the pre-existing groups against each other, and only attaches
//!   previously-unassigned articles.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use tracing::{info, warn};

use newsloom_common::{SimilarityEdge, Tier, TierConfig};

use crate::error::Result;
use crate::reader::StoreReader;
use crate::store::Store;
use crate::tier;
use crate::writer::StoreWriter;

/// Maximum storyline label length in characters, ellipsis included.
pub const LABEL_MAX_CHARS: usize = 60;

/// Article snapshot used during weaving.
#[derive(Debug, Clone)]
pub struct ArticleRef {
    pub id: i64,
    pub title: String,
    pub date: NaiveDate,
    /// Existing assignment, honored only in incremental mode.
    pub storyline_id: Option<i64>,
    /// Tier recorded when the article was first attached, if assigned.
    pub tier: Option<Tier>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeaveMode {
    Rebuild,
    Incremental,
}

/// One member of a woven group, in final sequence order.
#[derive(Debug, Clone)]
pub struct WovenMember {
    pub article_id: i64,
    pub date: NaiveDate,
    pub tier: Tier,
    pub sequence_order: u32,
}

/// One storyline produced by the weave.
#[derive(Debug, Clone)]
pub struct WovenGroup {
    /// Id of the pre-existing storyline this group extends, if any.
    pub existing_id: Option<i64>,
    pub label: String,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub members: Vec<WovenMember>,
}

/// Result of the pure weave pass.
#[derive(Debug, Default)]
pub struct WeaveOutcome {
    pub groups: Vec<WovenGroup>,
    /// Self-loops, duplicate pairs, and edges naming unknown articles.
    pub edges_skipped: u32,
    pub near_duplicate_edges: u32,
    pub continuation_edges: u32,
    pub related_edges: u32,
    /// Articles newly assigned by this pass.
    pub articles_assigned: u32,
}

/// Stats from a store-backed weave run.
#[derive(Debug, Default)]
pub struct WeaveStats {
    pub storylines_created: u32,
    pub storylines_grown: u32,
    pub articles_assigned: u32,
    pub edges_skipped: u32,
    pub near_duplicate_edges: u32,
    pub continuation_edges: u32,
    pub related_edges: u32,
}

impl std::fmt::Display for WeaveStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "StorylineWeaver: {} created, {} grown, {} articles assigned, \
             {} edges skipped (tiers: {} near-duplicate, {} continuation, {} related)",
            self.storylines_created,
            self.storylines_grown,
            self.articles_assigned,
            self.edges_skipped,
            self.near_duplicate_edges,
            self.continuation_edges,
            self.related_edges,
        )
    }
}

/// Derive a short storyline label from the earliest member's title.
pub fn derive_label(title: &str) -> String {
    let trimmed = title.trim();
    if trimmed.chars().count() <= LABEL_MAX_CHARS {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(LABEL_MAX_CHARS - 3).collect();
    format!("{}...", cut.trim_end())
}

/// Array-backed disjoint-set with union by rank and path halving.
struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// Union two elements, returning the surviving root.
    fn union(&mut self, a: usize, b: usize) -> usize {
        let mut ra = self.find(a);
        let mut rb = self.find(b);
        if ra == rb {
            return ra;
        }
        if self.rank[ra] < self.rank[rb] {
            std::mem::swap(&mut ra, &mut rb);
        }
        self.parent[rb] = ra;
        if self.rank[ra] == self.rank[rb] {
            self.rank[ra] += 1;
        }
        ra
    }
}

#[derive(Debug, Clone, Copy)]
struct ClassifiedEdge {
    a: usize,
    b: usize,
    lo: i64,
    hi: i64,
    cosine: f64,
    tier: Tier,
}

/// Pure weave over an in-memory snapshot of articles and edges.
pub fn weave(
    articles: &[ArticleRef],
    edges: &[SimilarityEdge],
    cfg: &TierConfig,
    mode: WeaveMode,
) -> WeaveOutcome {
    let mut outcome = WeaveOutcome::default();

    let index: HashMap<i64, usize> = articles
        .iter()
        .enumerate()
        .map(|(i, a)| (a.id, i))
        .collect();
    let n = articles.len();

    let mut dsu = DisjointSet::new(n);
    let mut assigned = vec![false; n];
    let mut member_tier: Vec<Option<Tier>> = vec![None; n];
    // Root-indexed component metadata, merged on every union.
    let mut existing_of: Vec<Option<i64>> = vec![None; n];
    let mut grew = vec![false; n];

    if mode == WeaveMode::Incremental {
        let mut by_storyline: HashMap<i64, Vec<usize>> = HashMap::new();
        for (i, article) in articles.iter().enumerate() {
            if let Some(sid) = article.storyline_id {
                by_storyline.entry(sid).or_default().push(i);
                assigned[i] = true;
                member_tier[i] = Some(article.tier.unwrap_or(Tier::Related));
            }
        }
        for (sid, members) in by_storyline {
            let mut root = members[0];
            for &m in &members[1..] {
                root = dsu.union(root, m);
            }
            existing_of[dsu.find(root)] = Some(sid);
        }
    }

    // Validate and classify edges.
    let mut seen: HashSet<(i64, i64)> = HashSet::new();
    let mut classified: Vec<ClassifiedEdge> = Vec::with_capacity(edges.len());
    for edge in edges {
        if edge.src_id == edge.dst_id {
            outcome.edges_skipped += 1;
            continue;
        }
        let (lo, hi) = if edge.src_id < edge.dst_id {
            (edge.src_id, edge.dst_id)
        } else {
            (edge.dst_id, edge.src_id)
        };
        if !seen.insert((lo, hi)) {
            outcome.edges_skipped += 1;
            continue;
        }
        let (a, b) = match (index.get(&lo), index.get(&hi)) {
            (Some(&a), Some(&b)) => (a, b),
            _ => {
                outcome.edges_skipped += 1;
                continue;
            }
        };
        let day_delta = (articles[a].date - articles[b].date).num_days().abs();
        let Some(tier) = tier::classify(edge.cosine, day_delta, edge.shared_entities.len(), cfg)
        else {
            continue;
        };
        match tier {
            Tier::NearDuplicate => outcome.near_duplicate_edges += 1,
            Tier::Continuation => outcome.continuation_edges += 1,
            Tier::Related => outcome.related_edges += 1,
        }
        classified.push(ClassifiedEdge {
            a,
            b,
            lo,
            hi,
            cosine: edge.cosine,
            tier,
        });
    }

    if outcome.edges_skipped > 0 {
        warn!(
            skipped = outcome.edges_skipped,
            "Skipped malformed or unknown-article similarity edges"
        );
    }

    // Tier rank ascending, cosine descending, pair ascending.
    classified.sort_by(|x, y| {
        x.tier
            .cmp(&y.tier)
            .then_with(|| y.cosine.total_cmp(&x.cosine))
            .then_with(|| (x.lo, x.hi).cmp(&(y.lo, y.hi)))
    });

    for edge in &classified {
        match (assigned[edge.a], assigned[edge.b]) {
            (false, false) => {
                let root = merge(&mut dsu, &mut existing_of, &mut grew, edge.a, edge.b);
                grew[root] = true;
                assigned[edge.a] = true;
                assigned[edge.b] = true;
                member_tier[edge.a] = Some(edge.tier);
                member_tier[edge.b] = Some(edge.tier);
                outcome.articles_assigned += 2;
            }
            (true, false) => {
                let root = merge(&mut dsu, &mut existing_of, &mut grew, edge.a, edge.b);
                grew[root] = true;
                assigned[edge.b] = true;
                member_tier[edge.b] = Some(edge.tier);
                outcome.articles_assigned += 1;
            }
            (false, true) => {
                let root = merge(&mut dsu, &mut existing_of, &mut grew, edge.a, edge.b);
                grew[root] = true;
                assigned[edge.a] = true;
                member_tier[edge.a] = Some(edge.tier);
                outcome.articles_assigned += 1;
            }
            (true, true) => {
                // Only near-duplicate evidence merges two existing groups.
                if edge.tier != Tier::NearDuplicate {
                    continue;
                }
                let ra = dsu.find(edge.a);
                let rb = dsu.find(edge.b);
                if ra == rb {
                    continue;
                }
                // Pre-existing storylines never fuse during an
                // incremental pass.
                if existing_of[ra].is_some() && existing_of[rb].is_some() {
                    continue;
                }
                let root = merge(&mut dsu, &mut existing_of, &mut grew, ra, rb);
                grew[root] = true;
            }
        }
    }

    // Collect components into ordered groups.
    let mut components: HashMap<usize, Vec<usize>> = HashMap::new();
    for i in 0..n {
        if assigned[i] {
            components.entry(dsu.find(i)).or_default().push(i);
        }
    }

    for (root, mut members) in components {
        if mode == WeaveMode::Incremental && !grew[root] {
            continue;
        }
        members.sort_by_key(|&i| (articles[i].date, articles[i].id));

        let woven: Vec<WovenMember> = members
            .iter()
            .enumerate()
            .map(|(seq, &i)| WovenMember {
                article_id: articles[i].id,
                date: articles[i].date,
                tier: member_tier[i].unwrap_or(Tier::Related),
                sequence_order: seq as u32,
            })
            .collect();

        let first = &articles[members[0]];
        let last_date = woven.last().map(|m| m.date).unwrap_or(first.date);

        outcome.groups.push(WovenGroup {
            existing_id: existing_of[root],
            label: derive_label(&first.title),
            first_date: first.date,
            last_date,
            members: woven,
        });
    }

    outcome
        .groups
        .sort_by_key(|g| (g.first_date, g.members[0].article_id));

    outcome
}

/// Union two components and carry their metadata onto the new root.
fn merge(
    dsu: &mut DisjointSet,
    existing_of: &mut [Option<i64>],
    grew: &mut [bool],
    a: usize,
    b: usize,
) -> usize {
    let ra = dsu.find(a);
    let rb = dsu.find(b);
    if ra == rb {
        return ra;
    }
    let existing = existing_of[ra].or(existing_of[rb]);
    let grown = grew[ra] || grew[rb];
    let root = dsu.union(ra, rb);
    existing_of[root] = existing;
    grew[root] = grown;
    root
}

/// Store-backed weaver: loads the similarity graph, runs the pure weave,
/// and commits one storyline per transaction so an aborted pass never
/// leaves a partially written group behind.
pub struct StorylineWeaver {
    reader: StoreReader,
    writer: StoreWriter,
    cfg: TierConfig,
}

impl StorylineWeaver {
    pub fn new(store: Store, cfg: TierConfig) -> Self {
        Self {
            reader: StoreReader::new(store.clone()),
            writer: StoreWriter::new(store),
            cfg,
        }
    }

    /// Discard the previous partition and reweave the full graph.
    pub async fn rebuild(&self) -> Result<WeaveStats> {
        let articles = self.reader.load_article_refs().await?;
        let edges = self.reader.load_similarity_edges().await?;
        let outcome = weave(&articles, &edges, &self.cfg, WeaveMode::Rebuild);

        self.writer.clear_assignments().await?;

        let mut stats = stats_from(&outcome);
        for group in &outcome.groups {
            self.writer.create_storyline(group).await?;
            stats.storylines_created += 1;
        }

        info!(
            created = stats.storylines_created,
            assigned = stats.articles_assigned,
            skipped = stats.edges_skipped,
            "Storyline rebuild complete"
        );
        Ok(stats)
    }

    /// Attach previously-unassigned articles without disturbing existing
    /// groups.
    pub async fn run_incremental(&self) -> Result<WeaveStats> {
        let articles = self.reader.load_article_refs().await?;
        let edges = self.reader.load_similarity_edges().await?;
        let outcome = weave(&articles, &edges, &self.cfg, WeaveMode::Incremental);

        let mut stats = stats_from(&outcome);
        for group in &outcome.groups {
            match group.existing_id {
                Some(id) => {
                    self.writer.grow_storyline(id, group).await?;
                    stats.storylines_grown += 1;
                }
                None => {
                    self.writer.create_storyline(group).await?;
                    stats.storylines_created += 1;
                }
            }
        }

        info!(
            created = stats.storylines_created,
            grown = stats.storylines_grown,
            assigned = stats.articles_assigned,
            skipped = stats.edges_skipped,
            "Incremental storyline weave complete"
        );
        Ok(stats)
    }
}

fn stats_from(outcome: &WeaveOutcome) -> WeaveStats {
    WeaveStats {
        articles_assigned: outcome.articles_assigned,
        edges_skipped: outcome.edges_skipped,
        near_duplicate_edges: outcome.near_duplicate_edges,
        continuation_edges: outcome.continuation_edges,
        related_edges: outcome.related_edges,
        ..WeaveStats::default()
    }
}
