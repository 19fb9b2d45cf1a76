use std::sync::Arc;

use sectionizer_core::{
    extract_references, LanguageDetector, RejectedFragment, SectionizeError, Sectionizer,
    SectionizerConfigBuilder, REFERENCES_KEY,
};

/// Accepts any text containing a letter.
struct LettersAreEnglish;

impl LanguageDetector for LettersAreEnglish {
    fn is_english(&self, text: &str) -> bool {
        text.chars().any(|c| c.is_alphabetic())
    }
}

fn sectionizer() -> Sectionizer {
    Sectionizer::new().with_detector(Arc::new(LettersAreEnglish))
}

fn paper(sections: &[(&str, &str)]) -> String {
    sections
        .iter()
        .map(|(heading, body)| format!("{}\n\n{}", heading, body))
        .collect::<Vec<_>>()
        .join("\n\n\n")
}

#[test]
fn lone_abstract_yields_no_sections() {
    let text = "Abstract\n\nSmith, J. (2020). Climate risk. *Journal of X*, 12(3), 45–67.\n\nA second paragraph follows here.";
    let result = sectionizer().sectionize(text);
    assert!(matches!(result, Err(SectionizeError::NoValidSections)));
}

#[test]
fn conclusion_is_last_kept_section() {
    let text = paper(&[
        ("Introduction", "Sea levels rise along the coast."),
        ("Results", "Flooding became more frequent."),
        ("Conclusion", "Adaptation planning must begin now."),
        ("References", "Smith, J. 2020 Tides and storms, Journal of Seas"),
        ("Appendix", "Extra station tables."),
    ]);
    let doc = sectionizer().sectionize(&text).unwrap();

    assert_eq!(
        doc.sections.keys().collect::<Vec<_>>(),
        vec!["Introduction", "Results", "Conclusion"]
    );
    assert_eq!(doc.references, None);
    let rejected: Vec<_> = doc.rejected.iter().map(|r| r.heading()).collect();
    assert_eq!(rejected, vec!["References", "Appendix"]);
    assert!(doc
        .rejected
        .iter()
        .all(|r| matches!(r, RejectedFragment::Span { .. })));
}

#[test]
fn caption_paragraph_stays_in_content() {
    let split = extract_references("Figure 3: Observed trends in sea level.");
    assert_eq!(split.content, "Figure 3: Observed trends in sea level.");
    assert_eq!(split.references, None);
}

#[test]
fn patience_decides_how_far_the_walk_reaches() {
    let body = [
        "Smith, J. 2020 Tides and storms, Journal of Seas",
        "Lee, K. 2019 Storm tracks in the north, Geophys. Res. Lett.",
        "This sentence is short.",
        "Ortiz, M. 2018 Surge models for estuaries, Ocean Sci.",
        "Nguyen, T. 2021 Tide gauges and drift, J. Coast. Res.",
    ]
    .join("\n\n");
    let discussion = format!("Coastal change is accelerating.\n{}", body);
    let text = paper(&[("Discussion", discussion.as_str())]);

    let doc = sectionizer().sectionize(&text).unwrap();
    let refs = doc.references.unwrap();
    assert!(refs.starts_with("Smith, J."));
    assert!(refs.ends_with("J. Coast. Res."));
    assert_eq!(doc.sections.get("Discussion"), Some("Coastal change is accelerating."));

    let config = SectionizerConfigBuilder::new().patience(0).build().unwrap();
    let strict = Sectionizer::with_config(config).with_detector(Arc::new(LettersAreEnglish));
    let doc = strict.sectionize(&text).unwrap();
    let refs = doc.references.unwrap();
    assert!(refs.starts_with("Ortiz, M."));
    assert!(doc.sections.get("Discussion").unwrap().ends_with("This sentence is short."));
}

#[test]
fn drop_local_headings_never_survive() {
    let text = paper(&[
        ("Keywords", "coast, tide, storm"),
        ("Introduction", "Sea levels rise along the coast."),
        ("Results and Table Notes", "Flooding became more frequent."),
        ("Methods", "Gauges were read each hour."),
    ]);
    let doc = sectionizer().sectionize(&text).unwrap();
    for key in doc.sections.keys() {
        let lower = key.to_lowercase();
        assert!(!lower.contains("keyword") && !lower.contains("table"), "{key}");
    }
    assert_eq!(
        doc.sections.keys().collect::<Vec<_>>(),
        vec!["Introduction", "Methods"]
    );
}

#[test]
fn halt_heading_hides_everything_after_it() {
    let text = paper(&[
        ("Introduction", "Sea levels rise along the coast."),
        ("Acknowledgments", "We thank the harbor staff."),
        ("Methods", "Gauges were read each hour."),
    ]);
    let doc = sectionizer().sectionize(&text).unwrap();
    assert_eq!(doc.sections.keys().collect::<Vec<_>>(), vec!["Introduction"]);
}

#[test]
fn processed_map_appends_references_last() {
    let text = paper(&[
        ("Introduction", "Sea levels rise along the coast."),
        (
            "Discussion",
            "Coastal change is accelerating.\n\n[1] Smith, J. 2020 Tides and storms along the coast, Journal of Seas",
        ),
    ]);
    let doc = sectionizer().sectionize(&text).unwrap();
    let map = doc.to_processed_map();
    let keys: Vec<_> = map.keys().collect();
    assert_eq!(keys, vec!["Introduction", "Discussion", REFERENCES_KEY]);

    let json = serde_json::to_string(&map).unwrap();
    assert!(json.find("Introduction").unwrap() < json.find(REFERENCES_KEY).unwrap());
}

#[test]
fn identical_input_gives_identical_output() {
    let text = paper(&[
        ("Introduction", "Sea levels rise along the coast."),
        ("Results", "Flooding became 12 34 56 more frequent.\n99 99 99 99"),
        ("Conclusion", "Adaptation planning must begin now."),
    ]);
    let s = sectionizer();
    let a = s.sectionize(&text).unwrap();
    let b = s.sectionize(&text).unwrap();
    assert_eq!(
        serde_json::to_string(&a.to_processed_map()).unwrap(),
        serde_json::to_string(&b.to_processed_map()).unwrap()
    );
    assert_eq!(
        serde_json::to_string(&a.rejected).unwrap(),
        serde_json::to_string(&b.rejected).unwrap()
    );
}

#[test]
fn default_detector_accepts_english_prose() {
    let text = paper(&[
        (
            "Introduction",
            "The coastal survey measured water levels at twelve stations over three winters and compared them with records from the previous decade.",
        ),
        (
            "Methods",
            "Each station was visited every morning, and the readings were checked against the harbor logbooks kept by the local authorities.",
        ),
    ]);
    let doc = Sectionizer::new().sectionize(&text).unwrap();
    assert_eq!(
        doc.sections.keys().collect::<Vec<_>>(),
        vec!["Introduction", "Methods"]
    );
}

#[test]
fn default_detector_rejects_foreign_lines() {
    let body = [
        "The coastal survey measured water levels at twelve stations over three winters.",
        "Der Ozean hat sich im letzten Jahrhundert stetig erwärmt und dieser Trend wird sich fortsetzen.",
        "Each station was visited every morning and the readings were checked against the logbooks.",
    ]
    .join("\n");
    let text = paper(&[("Introduction", body.as_str())]);
    let doc = Sectionizer::new().sectionize(&text).unwrap();

    let intro = doc.sections.get("Introduction").unwrap();
    assert!(!intro.contains("Ozean"));
    assert!(intro.starts_with("The coastal survey"));
    assert!(doc.rejected.iter().any(|r| matches!(
        r,
        RejectedFragment::Line { text, .. } if text.starts_with("Der Ozean")
    )));
}
