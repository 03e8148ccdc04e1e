//! Pattern detection over the ledger.
//!
//! Every detector is a pure function of (events, outcomes) and can be
//! re-run from scratch at any time. Patterns are signals for calibration,
//! never treated as truth. Minimum frequency for any pattern is 2 in the
//! same context; outcome_pattern additionally needs 3 events for its
//! consistency ratio to mean anything.

use std::collections::BTreeMap;

use crate::types::{
    DecisionEvent, Domain, Mode, Outcome, OutcomeResult, Pattern, PatternKind,
};

/// Emotional load above this marks an event as emotionally loaded.
const EMOTIONAL_FLOOR: f64 = 0.6;

/// Urgency above this marks a war event as high-urgency.
const HIGH_URGENCY: f64 = 0.7;

/// Mean damage above this marks escalation as biting.
const ESCALATION_DAMAGE_FLOOR: f64 = 0.3;

/// Identical-result share needed for an outcome pattern.
const OUTCOME_CONSISTENCY: f64 = 0.7;

/// Minimum events for an outcome pattern.
const OUTCOME_MIN_EVENTS: usize = 3;

/// Postures that count as escalation in war events.
fn is_escalation_posture(posture: &str) -> bool {
    posture.contains("pressure") || posture.contains("escalat")
}

fn was_override(event: &DecisionEvent) -> bool {
    event.action_followed_counsel == Some(false) || event.override_reason.is_some()
}

/// Run every detector and return the combined, deterministic pattern list.
pub fn detect_patterns(events: &[DecisionEvent], outcomes: &[Outcome]) -> Vec<Pattern> {
    let outcome_by_event: BTreeMap<&str, &Outcome> = outcomes
        .iter()
        .map(|o| (o.event_id.as_str(), o))
        .collect();

    let mut patterns = Vec::new();
    patterns.extend(repetition_loops(events, &outcome_by_event));
    patterns.extend(override_loops(events, &outcome_by_event, None));
    patterns.extend(emotional_loops(events, &outcome_by_event));
    patterns.extend(outcome_patterns(events, &outcome_by_event));
    patterns.extend(war_escalation_bias(events, &outcome_by_event));
    patterns.extend(war_false_urgency(events, &outcome_by_event));
    patterns.extend(override_loops(events, &outcome_by_event, Some(Mode::War)));
    patterns.sort_by(|a, b| a.pattern_id.cmp(&b.pattern_id));
    patterns
}

fn make_pattern(
    kind: PatternKind,
    key: String,
    description: String,
    domain: Option<Domain>,
    group: &[&DecisionEvent],
    outcome_by_event: &BTreeMap<&str, &Outcome>,
) -> Pattern {
    let last_seen = group
        .iter()
        .map(|e| e.timestamp.as_str())
        .max()
        .unwrap_or_default()
        .to_string();
    let last_outcome = group
        .iter()
        .rev()
        .find_map(|e| outcome_by_event.get(e.event_id.as_str()))
        .map(|o| o.result);

    Pattern {
        pattern_id: format!("{}:{key}", kind.as_str()),
        kind,
        description,
        domain,
        frequency: group.len() as u32,
        last_seen,
        last_outcome,
    }
}

/// Same domain + same illusion appearing twice or more.
fn repetition_loops(
    events: &[DecisionEvent],
    outcomes: &BTreeMap<&str, &Outcome>,
) -> Vec<Pattern> {
    let mut groups: BTreeMap<(Domain, &str), Vec<&DecisionEvent>> = BTreeMap::new();
    for event in events {
        for illusion in &event.illusions_detected {
            groups
                .entry((event.domain, illusion.as_str()))
                .or_default()
                .push(event);
        }
    }

    groups
        .into_iter()
        .filter(|(_, group)| group.len() >= 2)
        .map(|((domain, illusion), group)| {
            make_pattern(
                PatternKind::RepetitionLoop,
                format!("{domain}:{illusion}"),
                format!("illusion {illusion:?} recurs in {domain} ({}x)", group.len()),
                Some(domain),
                &group,
                outcomes,
            )
        })
        .collect()
}

/// Sovereign ignored counsel twice or more in the same domain. With
/// `mode_filter = Some(War)` this is the war_repeated_overrides detector.
fn override_loops(
    events: &[DecisionEvent],
    outcomes: &BTreeMap<&str, &Outcome>,
    mode_filter: Option<Mode>,
) -> Vec<Pattern> {
    let kind = match mode_filter {
        Some(Mode::War) => PatternKind::WarRepeatedOverrides,
        _ => PatternKind::OverrideLoop,
    };

    let mut groups: BTreeMap<Domain, Vec<&DecisionEvent>> = BTreeMap::new();
    for event in events {
        if let Some(mode) = mode_filter {
            if event.mode != mode {
                continue;
            }
        }
        if was_override(event) {
            groups.entry(event.domain).or_default().push(event);
        }
    }

    groups
        .into_iter()
        .filter(|(_, group)| group.len() >= 2)
        .map(|(domain, group)| {
            make_pattern(
                kind,
                domain.to_string(),
                format!("counsel overridden {}x in {domain}", group.len()),
                Some(domain),
                &group,
                outcomes,
            )
        })
        .collect()
}

/// Two or more high-emotional-load events in the same domain.
fn emotional_loops(
    events: &[DecisionEvent],
    outcomes: &BTreeMap<&str, &Outcome>,
) -> Vec<Pattern> {
    let mut groups: BTreeMap<Domain, Vec<&DecisionEvent>> = BTreeMap::new();
    for event in events {
        if event.emotional_load > EMOTIONAL_FLOOR {
            groups.entry(event.domain).or_default().push(event);
        }
    }

    groups
        .into_iter()
        .filter(|(_, group)| group.len() >= 2)
        .map(|(domain, group)| {
            make_pattern(
                PatternKind::EmotionalLoop,
                domain.to_string(),
                format!(
                    "{}x decisions in {domain} under emotional load > {EMOTIONAL_FLOOR}",
                    group.len()
                ),
                Some(domain),
                &group,
                outcomes,
            )
        })
        .collect()
}

/// Three or more resolved events in a domain with a ≥70% identical result.
fn outcome_patterns(
    events: &[DecisionEvent],
    outcomes: &BTreeMap<&str, &Outcome>,
) -> Vec<Pattern> {
    let mut groups: BTreeMap<Domain, Vec<&DecisionEvent>> = BTreeMap::new();
    for event in events {
        if outcomes.contains_key(event.event_id.as_str()) {
            groups.entry(event.domain).or_default().push(event);
        }
    }

    let mut patterns = Vec::new();
    for (domain, group) in groups {
        if group.len() < OUTCOME_MIN_EVENTS {
            continue;
        }
        let mut counts: BTreeMap<&str, (OutcomeResult, usize)> = BTreeMap::new();
        for event in &group {
            let result = outcomes[event.event_id.as_str()].result;
            counts
                .entry(result.as_str())
                .and_modify(|(_, n)| *n += 1)
                .or_insert((result, 1));
        }
        if let Some((result, n)) = counts
            .values()
            .find(|(_, n)| *n as f64 / group.len() as f64 >= OUTCOME_CONSISTENCY)
        {
            patterns.push(make_pattern(
                PatternKind::OutcomePattern,
                domain.to_string(),
                format!(
                    "{n} of {} decisions in {domain} resolved {}",
                    group.len(),
                    result.as_str()
                ),
                Some(domain),
                &group,
                outcomes,
            ));
        }
    }
    patterns
}

/// Two or more escalation-postured war events with mean damage > 0.3.
fn war_escalation_bias(
    events: &[DecisionEvent],
    outcomes: &BTreeMap<&str, &Outcome>,
) -> Vec<Pattern> {
    let mut groups: BTreeMap<Domain, Vec<&DecisionEvent>> = BTreeMap::new();
    for event in events {
        if event.mode == Mode::War
            && is_escalation_posture(&event.posture)
            && outcomes.contains_key(event.event_id.as_str())
        {
            groups.entry(event.domain).or_default().push(event);
        }
    }

    let mut patterns = Vec::new();
    for (domain, group) in groups {
        if group.len() < 2 {
            continue;
        }
        let mean_damage: f64 = group
            .iter()
            .map(|e| outcomes[e.event_id.as_str()].damage)
            .sum::<f64>()
            / group.len() as f64;
        if mean_damage > ESCALATION_DAMAGE_FLOOR {
            patterns.push(make_pattern(
                PatternKind::WarEscalationBias,
                domain.to_string(),
                format!(
                    "{}x escalation postures in {domain} with mean damage {mean_damage:.2}",
                    group.len()
                ),
                Some(domain),
                &group,
                outcomes,
            ));
        }
    }
    patterns
}

/// Two or more high-urgency war events whose resolved outcome is failure.
fn war_false_urgency(
    events: &[DecisionEvent],
    outcomes: &BTreeMap<&str, &Outcome>,
) -> Vec<Pattern> {
    let group: Vec<&DecisionEvent> = events
        .iter()
        .filter(|e| {
            e.mode == Mode::War
                && e.urgency > HIGH_URGENCY
                && outcomes
                    .get(e.event_id.as_str())
                    .map(|o| o.result == OutcomeResult::Failure)
                    .unwrap_or(false)
        })
        .collect();

    if group.len() < 2 {
        return Vec::new();
    }

    vec![make_pattern(
        PatternKind::WarFalseUrgencyLoop,
        "war".to_string(),
        format!(
            "{}x high-urgency war decisions resolved as failure",
            group.len()
        ),
        None,
        &group,
        outcomes,
    )]
}
