//! Deterministic search plans for deep research.
//!
//! A plan alternates archive and web steps over a list of query variants:
//! the question itself, a region variant, one variant per decade of the
//! year window, then generic broadening variants.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ResearchError;
use crate::types::evidence::{PlanScope, SearchPlanStep};

/// Decade variants kept from a long year window.
const MAX_DECADES: usize = 4;

/// How many steps a plan has.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanDepth {
    Quick,
    #[default]
    Standard,
    Deep,
}

impl PlanDepth {
    pub fn steps(&self) -> usize {
        match self {
            PlanDepth::Quick => 2,
            PlanDepth::Standard => 4,
            PlanDepth::Deep => 6,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanDepth::Quick => "quick",
            PlanDepth::Standard => "standard",
            PlanDepth::Deep => "deep",
        }
    }
}

impl fmt::Display for PlanDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanDepth {
    type Err = ResearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "quick" => Ok(PlanDepth::Quick),
            "standard" => Ok(PlanDepth::Standard),
            "deep" => Ok(PlanDepth::Deep),
            other => Err(ResearchError::Config(format!(
                "unknown plan depth '{other}' (expected quick, standard or deep)"
            ))),
        }
    }
}

struct Variant {
    query: String,
    why: String,
}

/// Build a plan of `depth.steps()` steps, archive first.
pub fn build_search_plan(
    question: &str,
    region: Option<&str>,
    window: Option<(i32, i32)>,
    depth: PlanDepth,
) -> Vec<SearchPlanStep> {
    let question = question.split_whitespace().collect::<Vec<_>>().join(" ");
    let region = region.map(str::trim).filter(|r| !r.is_empty());

    let mut variants = vec![Variant {
        query: question.clone(),
        why: "the question as asked".to_string(),
    }];
    if let Some(region) = region {
        variants.push(Variant {
            query: format!("{question} {region}"),
            why: format!("narrowed to {region}"),
        });
    }
    if let Some((from, to)) = window {
        let (from, to) = (i64::from(from.min(to)), i64::from(from.max(to)));
        let mut decade = from.div_euclid(10) * 10;
        let mut decades = 0;
        while decade <= to && decades < MAX_DECADES {
            variants.push(Variant {
                query: format!("{question} {decade}s"),
                why: format!("coverage from the {decade}s"),
            });
            decade += 10;
            decades += 1;
        }
    }
    for (suffix, why) in [("history", "broader historical accounts"), ("records", "official records")] {
        variants.push(Variant {
            query: format!("{question} {suffix}"),
            why: why.to_string(),
        });
    }

    let scopes = [PlanScope::Archive, PlanScope::Web];
    variants
        .iter()
        .flat_map(|variant| scopes.iter().map(move |scope| (variant, *scope)))
        .take(depth.steps())
        .map(|(variant, scope)| SearchPlanStep {
            query: variant.query.clone(),
            rationale: match scope {
                PlanScope::Archive => format!("Contemporary archive coverage: {}", variant.why),
                PlanScope::Web => format!("Secondary sources and local histories: {}", variant.why),
            },
            scope,
        })
        .collect()
}
