//! ePrivacy Directive

use super::{regulation, requirement, rule, RequirementDef};
use crate::ontology::OntologySeed;

/// ePrivacy regulation, articles and requirements
pub fn get_seed() -> OntologySeed {
    OntologySeed {
        regulations: vec![regulation(
            "eprivacy",
            "ePrivacy Directive",
            "EU",
            "2002/58/EC",
            "Directive on privacy and electronic communications",
        )],
        rules: vec![rule(
            "eprivacy-art-5-3",
            "eprivacy",
            "Art.5(3)",
            "Storing information on terminal equipment",
            "Storing or accessing information on a user's device requires prior informed consent",
        )],
        requirements: vec![requirement(RequirementDef {
            id: "req-cookie-consent",
            name: "Obtain consent before non-essential cookies",
            description: "Non-essential cookies must not be set before the visitor consents through a banner",
            fix: "Block analytics and marketing cookies until the consent banner is accepted",
            severity: "serious",
            rules: &["eprivacy-art-5-3", "gdpr-art-7"],
            tests: &["cookies", "privacy-policy"],
        })],
        tests: Vec::new(),
    }
}
