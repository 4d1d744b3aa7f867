//! Read-side aggregation engine.
//!
//! Every aggregate is computed fresh from the store on each call — no
//! caching, no write access. Denominators are always guarded: a cell with
//! `total == 0` reports `conversion == 0.0`. Exact bucketing and sort
//! rules are part of each aggregate's contract.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use crate::db::{DbError, SalesDb};

/// Null-replacement labels used by the distributions.
const UNKNOWN_BUDGET: &str = "Unknown";
const UNKNOWN_USE_CASE: &str = "Desconocido";
const UNKNOWN_ORIGIN: &str = "Desconocido";
const UNASSIGNED_SELLER: &str = "Sin asignar";

fn ratio(closed: i64, total: i64) -> f64 {
    if total == 0 {
        0.0
    } else {
        closed as f64 / total as f64
    }
}

// =============================================================================
// Overview & funnel
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct MetricsOverview {
    pub total_clients: i64,
    pub classified_clients: i64,
    pub open_opportunities: i64,
    pub closed_wins: i64,
}

pub fn overview(db: &SalesDb) -> Result<MetricsOverview, DbError> {
    let facts = db.list_meeting_facts()?;
    let closed_wins = facts.iter().filter(|f| f.meeting.closed).count() as i64;
    Ok(MetricsOverview {
        total_clients: db.count_clients()?,
        classified_clients: db.count_classifications()?,
        open_opportunities: facts.len() as i64 - closed_wins,
        closed_wins,
    })
}

/// Funnel counts. The four buckets deliberately overlap — a closed meeting
/// with a low fit score counts in both `evaluation` and `closed`. This is
/// the aggregate's contract, not a strict sequential funnel.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsFunnel {
    pub discovery: i64,
    pub evaluation: i64,
    pub negotiation: i64,
    pub closed: i64,
}

pub fn funnel(db: &SalesDb) -> Result<MetricsFunnel, DbError> {
    let facts = db.list_meeting_facts()?;
    let mut out = MetricsFunnel {
        discovery: 0,
        evaluation: 0,
        negotiation: 0,
        closed: 0,
    };
    for fact in &facts {
        match &fact.classification {
            None => out.discovery += 1,
            Some(c) if c.fit_score < 0.6 => out.evaluation += 1,
            Some(c) if c.fit_score < 0.8 => out.negotiation += 1,
            Some(_) => {}
        }
        if fact.meeting.closed {
            out.closed += 1;
        }
    }
    Ok(out)
}

// =============================================================================
// Monthly conversion
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyConversion {
    pub month: String,
    pub total: i64,
    pub closed: i64,
    pub conversion: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversionSeries {
    pub monthly: Vec<MonthlyConversion>,
}

/// Meetings with a date, grouped by `YYYY-MM` label, ascending. The labels
/// sort lexicographically, which for this format is chronological.
pub fn monthly_conversion(db: &SalesDb) -> Result<ConversionSeries, DbError> {
    let facts = db.list_meeting_facts()?;
    let mut buckets: BTreeMap<String, (i64, i64)> = BTreeMap::new();
    for fact in &facts {
        let Some(date) = fact.meeting.meeting_date.as_deref() else {
            continue;
        };
        if date.len() < 7 {
            continue;
        }
        let entry = buckets.entry(date[..7].to_string()).or_default();
        entry.0 += 1;
        if fact.meeting.closed {
            entry.1 += 1;
        }
    }

    let monthly = buckets
        .into_iter()
        .map(|(month, (total, closed))| MonthlyConversion {
            month,
            total,
            closed,
            conversion: ratio(closed, total),
        })
        .collect();
    Ok(ConversionSeries { monthly })
}

// =============================================================================
// Urgency × budget heatmap
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct UrgencyBudgetCell {
    pub urgency: i32,
    pub budget_tier: String,
    pub total: i64,
    pub closed: i64,
    pub conversion: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UrgencyBudgetHeatmap {
    pub cells: Vec<UrgencyBudgetCell>,
}

/// Cross-tab of (urgency, budget_tier) over classified meetings; a null
/// budget tier lands in the literal "Unknown" cell.
pub fn urgency_budget_heatmap(db: &SalesDb) -> Result<UrgencyBudgetHeatmap, DbError> {
    let facts = db.list_meeting_facts()?;
    let mut buckets: BTreeMap<(i32, String), (i64, i64)> = BTreeMap::new();
    for fact in &facts {
        let Some(c) = &fact.classification else {
            continue;
        };
        let tier = c
            .budget_tier
            .clone()
            .unwrap_or_else(|| UNKNOWN_BUDGET.to_string());
        let entry = buckets.entry((c.urgency, tier)).or_default();
        entry.0 += 1;
        if fact.meeting.closed {
            entry.1 += 1;
        }
    }

    let cells = buckets
        .into_iter()
        .map(|((urgency, budget_tier), (total, closed))| UrgencyBudgetCell {
            urgency,
            budget_tier,
            total,
            closed,
            conversion: ratio(closed, total),
        })
        .collect();
    Ok(UrgencyBudgetHeatmap { cells })
}

// =============================================================================
// Use-case distribution
// =============================================================================

/// Meeting-status filter for distributions that support one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Closed,
    Open,
}

impl StatusFilter {
    pub fn parse(value: &str) -> Option<StatusFilter> {
        match value {
            "all" => Some(StatusFilter::All),
            "closed" => Some(StatusFilter::Closed),
            "open" => Some(StatusFilter::Open),
            _ => None,
        }
    }

    fn accepts(&self, closed: bool) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Closed => closed,
            StatusFilter::Open => !closed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UseCaseStat {
    pub use_case: String,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UseCaseDistribution {
    pub items: Vec<UseCaseStat>,
}

pub fn use_case_distribution(
    db: &SalesDb,
    status: StatusFilter,
) -> Result<UseCaseDistribution, DbError> {
    let facts = db.list_meeting_facts()?;
    let mut buckets: HashMap<String, i64> = HashMap::new();
    for fact in &facts {
        let Some(c) = &fact.classification else {
            continue;
        };
        if !status.accepts(fact.meeting.closed) {
            continue;
        }
        let name = c
            .use_case
            .clone()
            .unwrap_or_else(|| UNKNOWN_USE_CASE.to_string());
        *buckets.entry(name).or_default() += 1;
    }

    let mut items: Vec<UseCaseStat> = buckets
        .into_iter()
        .map(|(use_case, total)| UseCaseStat { use_case, total })
        .collect();
    items.sort_by(|a, b| b.total.cmp(&a.total).then(a.use_case.cmp(&b.use_case)));
    Ok(UseCaseDistribution { items })
}

// =============================================================================
// Pains & objections
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct PainStat {
    pub pain: String,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PainDistribution {
    pub items: Vec<PainStat>,
}

/// Frequency of each pain label across all classifications, descending by
/// count. Blank labels are dropped; comparison is exact-string.
pub fn pain_distribution(db: &SalesDb) -> Result<PainDistribution, DbError> {
    let facts = db.list_meeting_facts()?;
    let mut counts: HashMap<String, i64> = HashMap::new();
    for fact in &facts {
        let Some(c) = &fact.classification else {
            continue;
        };
        for pain in &c.pains {
            if !pain.is_empty() {
                *counts.entry(pain.clone()).or_default() += 1;
            }
        }
    }

    let mut items: Vec<PainStat> = counts
        .into_iter()
        .map(|(pain, total)| PainStat { pain, total })
        .collect();
    items.sort_by(|a, b| b.total.cmp(&a.total).then(a.pain.cmp(&b.pain)));
    Ok(PainDistribution { items })
}

#[derive(Debug, Clone, Serialize)]
pub struct AvailablePains {
    pub pains: Vec<String>,
}

/// The sorted distinct set of non-empty pain labels.
pub fn available_pains(db: &SalesDb) -> Result<AvailablePains, DbError> {
    Ok(AvailablePains {
        pains: db.distinct_pains()?,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct AvailableObjections {
    pub objections: Vec<String>,
}

/// The sorted distinct set of non-empty objection labels.
pub fn available_objections(db: &SalesDb) -> Result<AvailableObjections, DbError> {
    let facts = db.list_meeting_facts()?;
    let mut labels = BTreeSet::new();
    for fact in &facts {
        let Some(c) = &fact.classification else {
            continue;
        };
        for objection in &c.objections {
            if !objection.is_empty() {
                labels.insert(objection.clone());
            }
        }
    }
    Ok(AvailableObjections {
        objections: labels.into_iter().collect(),
    })
}

// =============================================================================
// Sentiment / seller / origin / automatization / competitors
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct SentimentConversionStat {
    pub sentiment: i32,
    pub closed: i64,
    pub open: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SentimentConversionSeries {
    pub items: Vec<SentimentConversionStat>,
}

/// Cross-tab of sentiment × {closed, open}, ascending by sentiment.
pub fn sentiment_conversion(db: &SalesDb) -> Result<SentimentConversionSeries, DbError> {
    let facts = db.list_meeting_facts()?;
    let mut buckets: BTreeMap<i32, (i64, i64)> = BTreeMap::new();
    for fact in &facts {
        let Some(c) = &fact.classification else {
            continue;
        };
        let entry = buckets.entry(c.sentiment).or_default();
        if fact.meeting.closed {
            entry.0 += 1;
        } else {
            entry.1 += 1;
        }
    }

    let items = buckets
        .into_iter()
        .map(|(sentiment, (closed, open))| SentimentConversionStat {
            sentiment,
            closed,
            open,
        })
        .collect();
    Ok(SentimentConversionSeries { items })
}

#[derive(Debug, Clone, Serialize)]
pub struct SellerConversionStat {
    pub seller: String,
    pub total: i64,
    pub closed: i64,
    pub conversion: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SellerConversionList {
    pub items: Vec<SellerConversionStat>,
}

/// Conversion per assigned seller (null → "Sin asignar"), sorted descending
/// by the raw conversion ratio alone — a 1/1 seller outranks 99/100.
pub fn seller_conversion(db: &SalesDb) -> Result<SellerConversionList, DbError> {
    let facts = db.list_meeting_facts()?;
    let mut buckets: HashMap<String, (i64, i64)> = HashMap::new();
    for fact in &facts {
        let seller = fact
            .meeting
            .assigned_seller
            .clone()
            .unwrap_or_else(|| UNASSIGNED_SELLER.to_string());
        let entry = buckets.entry(seller).or_default();
        entry.0 += 1;
        if fact.meeting.closed {
            entry.1 += 1;
        }
    }

    let mut items: Vec<SellerConversionStat> = buckets
        .into_iter()
        .map(|(seller, (total, closed))| SellerConversionStat {
            seller,
            total,
            closed,
            conversion: ratio(closed, total),
        })
        .collect();
    items.sort_by(|a, b| {
        b.conversion
            .partial_cmp(&a.conversion)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.seller.cmp(&b.seller))
    });
    Ok(SellerConversionList { items })
}

#[derive(Debug, Clone, Serialize)]
pub struct OriginStat {
    pub origin: String,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OriginDistribution {
    pub items: Vec<OriginStat>,
}

/// Lead-source distribution over classified meetings, descending by count.
pub fn origin_distribution(db: &SalesDb) -> Result<OriginDistribution, DbError> {
    let facts = db.list_meeting_facts()?;
    let mut buckets: HashMap<String, i64> = HashMap::new();
    for fact in &facts {
        let Some(c) = &fact.classification else {
            continue;
        };
        let origin = c
            .origin
            .clone()
            .unwrap_or_else(|| UNKNOWN_ORIGIN.to_string());
        *buckets.entry(origin).or_default() += 1;
    }

    let mut items: Vec<OriginStat> = buckets
        .into_iter()
        .map(|(origin, total)| OriginStat { origin, total })
        .collect();
    items.sort_by(|a, b| b.total.cmp(&a.total).then(a.origin.cmp(&b.origin)));
    Ok(OriginDistribution { items })
}

#[derive(Debug, Clone, Serialize)]
pub struct AutomatizationOutcome {
    pub automatization: bool,
    pub closed: i64,
    pub open: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AutomatizationOutcomeSeries {
    pub items: Vec<AutomatizationOutcome>,
}

/// Cross-tab of the automatization flag × {closed, open}, `true` first.
/// Classifications with a null flag are left out of both rows.
pub fn automatization_outcomes(db: &SalesDb) -> Result<AutomatizationOutcomeSeries, DbError> {
    let facts = db.list_meeting_facts()?;
    let mut counts: HashMap<bool, (i64, i64)> = HashMap::new();
    for fact in &facts {
        let Some(flag) = fact.classification.as_ref().and_then(|c| c.automatization) else {
            continue;
        };
        let entry = counts.entry(flag).or_default();
        if fact.meeting.closed {
            entry.0 += 1;
        } else {
            entry.1 += 1;
        }
    }

    let mut items: Vec<AutomatizationOutcome> = counts
        .into_iter()
        .map(|(automatization, (closed, open))| AutomatizationOutcome {
            automatization,
            closed,
            open,
        })
        .collect();
    items.sort_by(|a, b| b.automatization.cmp(&a.automatization));
    Ok(AutomatizationOutcomeSeries { items })
}

#[derive(Debug, Clone, Serialize)]
pub struct CompetitorWinRate {
    pub competitor: String,
    pub total: i64,
    pub closed: i64,
    pub conversion: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompetitorWinRateList {
    pub items: Vec<CompetitorWinRate>,
}

/// Win rate per competitor mentioned in classifications, descending by how
/// often the competitor appears.
pub fn competitor_win_rate(db: &SalesDb) -> Result<CompetitorWinRateList, DbError> {
    let facts = db.list_meeting_facts()?;
    let mut buckets: HashMap<String, (i64, i64)> = HashMap::new();
    for fact in &facts {
        let Some(c) = &fact.classification else {
            continue;
        };
        for competitor in &c.competitors {
            if competitor.is_empty() {
                continue;
            }
            let entry = buckets.entry(competitor.clone()).or_default();
            entry.0 += 1;
            if fact.meeting.closed {
                entry.1 += 1;
            }
        }
    }

    let mut items: Vec<CompetitorWinRate> = buckets
        .into_iter()
        .map(|(competitor, (total, closed))| CompetitorWinRate {
            competitor,
            total,
            closed,
            conversion: ratio(closed, total),
        })
        .collect();
    items.sort_by(|a, b| b.total.cmp(&a.total).then(a.competitor.cmp(&b.competitor)));
    Ok(CompetitorWinRateList { items })
}
