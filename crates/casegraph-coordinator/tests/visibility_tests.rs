//! Visibility of staged and committed entities across cases

mod common;

use casegraph_domain::{CaseId, ExtractionPass, SectionType};
use common::*;

const ALL_COMBINATIONS: [(ExtractionPass, SectionType); 3] = [
    (ExtractionPass::First, SectionType::Facts),
    (ExtractionPass::Second, SectionType::Discussion),
    (ExtractionPass::Third, SectionType::Conclusions),
];

#[tokio::test]
async fn test_staged_records_never_visible_to_other_cases() {
    let harness = Harness::new();
    let staging = harness.staging();
    for case in [7, 8, 9] {
        for (pass, section) in ALL_COMBINATIONS {
            staging
                .stage(class_candidate(case, &format!("Role{}{}", case, pass.number()), "Role", pass, section))
                .await
                .unwrap();
        }
        staging
            .stage(individual_candidate(case, "EngineerA", "Engineer A"))
            .await
            .unwrap();
    }

    let query = harness.query();
    for case in [7u64, 8, 9] {
        for (pass, section) in ALL_COMBINATIONS {
            let visible = query.entities_for_prompt(CaseId::new(case), pass, section).unwrap();
            assert_eq!(visible.staged.len(), 4);
            assert!(visible.staged.iter().all(|r| r.entity.case_id == CaseId::new(case)));
        }
    }
}

#[tokio::test]
async fn test_committed_class_visible_to_every_case() {
    let harness = Harness::new();
    harness
        .staging()
        .stage(class_candidate(7, "SafetyObligation", "Safety Obligation", ExtractionPass::First, SectionType::Facts))
        .await
        .unwrap();
    harness
        .coordinator()
        .commit(CaseId::new(7), &[class_id("SafetyObligation")])
        .await
        .unwrap();

    let query = harness.query();
    for case in [7u64, 8, 9, 1000] {
        let visible = query
            .entities_for_prompt(CaseId::new(case), ExtractionPass::Second, SectionType::Questions)
            .unwrap();
        assert!(visible.classes.iter().any(|c| c.entity.id == class_id("SafetyObligation")));
    }
}

#[tokio::test]
async fn test_committed_individual_scoped_to_owner() {
    let harness = Harness::new();
    harness
        .staging()
        .stage(individual_candidate(7, "EngineerA", "Engineer A"))
        .await
        .unwrap();
    harness
        .coordinator()
        .commit(CaseId::new(7), &[individual_id(7, "EngineerA")])
        .await
        .unwrap();

    let query = harness.query();
    let owner = query
        .entities_for_prompt(CaseId::new(7), ExtractionPass::First, SectionType::Facts)
        .unwrap();
    assert_eq!(owner.individuals.len(), 1);

    let other = query
        .entities_for_prompt(CaseId::new(8), ExtractionPass::First, SectionType::Facts)
        .unwrap();
    assert!(other.individuals.is_empty());
    assert!(!other.contains(&individual_id(7, "EngineerA")));
}

#[tokio::test]
async fn test_case7_staged_class_visible_in_later_section_only_to_case7() {
    let harness = Harness::new();
    harness
        .staging()
        .stage(class_candidate(
            7,
            "EnvironmentalEngineerRole",
            "Environmental Engineer Role",
            ExtractionPass::First,
            SectionType::Facts,
        ))
        .await
        .unwrap();

    let query = harness.query();
    let discussion = query
        .entities_for_prompt(CaseId::new(7), ExtractionPass::First, SectionType::Discussion)
        .unwrap();
    assert!(discussion.contains(&class_id("EnvironmentalEngineerRole")));

    let case8 = query
        .entities_for_prompt(CaseId::new(8), ExtractionPass::First, SectionType::Facts)
        .unwrap();
    assert!(!case8.contains(&class_id("EnvironmentalEngineerRole")));
}

#[tokio::test]
async fn test_case7_commit_visible_to_case8_while_case8_staging_stays_private() {
    let harness = Harness::new();
    let staging = harness.staging();
    staging
        .stage(class_candidate(
            7,
            "EnvironmentalEngineerRole",
            "Environmental Engineer Role",
            ExtractionPass::First,
            SectionType::Facts,
        ))
        .await
        .unwrap();
    staging
        .stage(class_candidate(8, "PublicWelfareDuty", "Public Welfare Duty", ExtractionPass::First, SectionType::Facts))
        .await
        .unwrap();

    harness
        .coordinator()
        .commit(CaseId::new(7), &[class_id("EnvironmentalEngineerRole")])
        .await
        .unwrap();

    let query = harness.query();
    let case8 = query
        .entities_for_prompt(CaseId::new(8), ExtractionPass::First, SectionType::Facts)
        .unwrap();
    let committed: Vec<_> = case8.iter().filter(|e| e.is_committed()).collect();
    assert_eq!(committed.len(), 1);
    assert_eq!(committed[0].entity().id, class_id("EnvironmentalEngineerRole"));

    let case7 = query
        .entities_for_prompt(CaseId::new(7), ExtractionPass::First, SectionType::Facts)
        .unwrap();
    assert!(!case7.contains(&class_id("PublicWelfareDuty")));
    assert!(case7.staged.is_empty(), "Committed rows are no longer staged");
}

#[tokio::test]
async fn test_case8_same_label_commits_independent_class() {
    let harness = Harness::new();
    let staging = harness.staging();
    let coordinator = harness.coordinator();

    staging
        .stage(class_candidate(
            7,
            "EnvironmentalEngineerRole",
            "Environmental Engineer Role",
            ExtractionPass::First,
            SectionType::Facts,
        ))
        .await
        .unwrap();
    coordinator
        .commit(CaseId::new(7), &[class_id("EnvironmentalEngineerRole")])
        .await
        .unwrap();

    staging
        .stage(class_candidate(
            8,
            "EnvironmentalEngineerRole_Case8",
            "Environmental Engineer Role",
            ExtractionPass::First,
            SectionType::Facts,
        ))
        .await
        .unwrap();
    coordinator
        .commit(CaseId::new(8), &[class_id("EnvironmentalEngineerRole_Case8")])
        .await
        .unwrap();

    let classes = harness.handles.permanent().classes().unwrap();
    assert_eq!(classes.len(), 2);
    for class in &classes {
        assert_eq!(class.entity.label, "Environmental Engineer Role");
        assert_eq!(class.provenance.discovered_in_cases.len(), 1);
    }
}

#[tokio::test]
async fn test_staged_order_and_shadowing() {
    let harness = Harness::new();
    let staging = harness.staging();
    staging
        .stage(class_candidate(7, "C", "C", ExtractionPass::Second, SectionType::Facts))
        .await
        .unwrap();
    staging
        .stage(class_candidate(7, "B", "B", ExtractionPass::First, SectionType::Discussion))
        .await
        .unwrap();
    staging
        .stage(class_candidate(7, "A", "A", ExtractionPass::First, SectionType::Facts))
        .await
        .unwrap();

    let query = harness.query();
    let visible = query
        .entities_for_prompt(CaseId::new(7), ExtractionPass::Third, SectionType::Facts)
        .unwrap();
    let labels: Vec<&str> = visible.staged.iter().map(|r| r.entity.label.as_str()).collect();
    assert_eq!(labels, vec!["A", "B", "C"]);

    // Case 8 commits an identical class; case 7's staged copy is now shadowed
    staging
        .stage(class_candidate(8, "B", "B", ExtractionPass::First, SectionType::Facts))
        .await
        .unwrap();
    harness.coordinator().commit(CaseId::new(8), &[class_id("B")]).await.unwrap();

    let visible = query
        .entities_for_prompt(CaseId::new(7), ExtractionPass::Third, SectionType::Facts)
        .unwrap();
    assert_eq!(visible.shadowed, 1);
    assert_eq!(visible.classes.len(), 1);
    let labels: Vec<&str> = visible.staged.iter().map(|r| r.entity.label.as_str()).collect();
    assert_eq!(labels, vec!["A", "C"]);
    assert_eq!(visible.len(), 3);
}
