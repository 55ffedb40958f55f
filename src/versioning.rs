//! Version assignment: chronological ordering and version numbering
//! within one candidate group

use chrono::{Datelike, NaiveDate};

use crate::basename;
use crate::grouping::CandidateMember;
use crate::model::{GroupedMember, Relation};

/// Parse one candidate date string: ISO date, ISO datetime prefix, or a
/// bare year (mapped to January 1st)
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }
    if value.len() >= 10 {
        if let Ok(date) = NaiveDate::parse_from_str(&value[..10], "%Y-%m-%d") {
            return Some(date);
        }
    }
    if let Ok(year) = value.parse::<i32>() {
        if (1500..=2100).contains(&year) {
            return NaiveDate::from_ymd_opt(year, 1, 1);
        }
    }
    None
}

/// The earliest valid candidate date is authoritative
fn best_date(member: &CandidateMember) -> Option<NaiveDate> {
    member
        .record
        .candidate_dates
        .iter()
        .filter_map(|d| parse_date(d))
        .min()
}

/// Order a candidate group chronologically and assign version numbers.
///
/// Dated members sort ascending by date (stable); undated members follow in
/// original input order and continue the sequence. The first element becomes
/// the base version with `version_number = 1`; an all-undated group falls
/// back to input order.
pub fn assign(members: Vec<CandidateMember>) -> Vec<GroupedMember> {
    let mut dated: Vec<(NaiveDate, CandidateMember)> = Vec::new();
    let mut undated: Vec<CandidateMember> = Vec::new();

    for member in members {
        match best_date(&member) {
            Some(date) => dated.push((date, member)),
            None => undated.push(member),
        }
    }

    dated.sort_by_key(|(date, _)| *date);

    let mut assigned = Vec::with_capacity(dated.len() + undated.len());
    let ordered = dated
        .into_iter()
        .map(|(date, m)| (Some(date), m))
        .chain(undated.into_iter().map(|m| (None, m)));

    for (position, (date, member)) in ordered.enumerate() {
        let is_base = position == 0;
        let relation = if is_base && member.relation == Relation::Unknown {
            Relation::Original
        } else {
            member.relation
        };

        assigned.push(GroupedMember {
            record_id: member.record.id.clone(),
            title: member.record.title.clone(),
            extracted_year: date
                .map(|d| d.year())
                .or_else(|| basename::title_year(&member.record.title)),
            is_base_version: is_base,
            version_number: (position + 1) as u32,
            relation,
            similarity: member.similarity,
            confidence: member.confidence,
        });
    }

    assigned
}
