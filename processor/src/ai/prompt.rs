//! Prompt generation for charge selection and rewording.

use super::ChatRequest;
use crate::models::Charges;

/// Display job: pick the most dramatic charge.
pub fn exciting_charge(charges: &Charges) -> ChatRequest {
    let system = "You are a TV show producer for a crime drama. Your task is to select the most \
                  sensational charge from a list. Return only the text of that charge.";

    let user = format!(
        "You are a TV show producer for a crime drama like 'Law and Order'. \
         Given the following list of summarized criminal charges for an individual, \
         pick the single charge that would be the most exciting or dramatic to feature for this character. \
         Return only the text of that single most exciting charge. \
         Do not add any extra explanation, disclaimers, or commentary. \
         List of charges:\n{}\n",
        charges.numbered_list()
    );

    ChatRequest::new(system, user, 100, 0.2)
}

/// Plain job, step one: pick the most interesting raw charge.
pub fn interesting_charge(charges: &Charges) -> ChatRequest {
    let system = "You are an assistant that analyzes criminal charge descriptions. Given a list of \
                  charge descriptions for an individual, identify and return only the text of the \
                  single most interesting, unusual, or serious charge. Do not add any extra \
                  explanation, disclaimers, or commentary.";

    let user = format!(
        "From the following list of charge descriptions, select and return the text of the \
         single most interesting, unusual, or serious one:\n{}",
        charges.numbered_list()
    );

    ChatRequest::new(system, user, 200, 0.2)
}

/// Plain job, step two: reword one legal charge in plain English.
pub fn reword_charge(charge: &str) -> ChatRequest {
    let system = "You are a helpful assistant that rewrites legal charge descriptions into plain, \
                  concise English suitable for an average person to understand. Aim for clarity \
                  and brevity, ideally under 15 words. Return only the rephrased charge \
                  description. For example, 'UTTERING FORGED INSTRUMENT' could be 'Using a fake \
                  document'. 'FAILURE TO APPEAR - MISDEMEANOR' could be 'Missed court for a minor \
                  offense'.";

    let user = format!("Rewrite this charge description in plain English: \"{{{}}}\"", charge);

    ChatRequest::new(system, user, 60, 0.1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exciting_prompt_lists_charges() {
        let req = exciting_charge(&Charges::parse("Shoplifting|Arson"));
        assert!(req.user.contains("1. Shoplifting\n2. Arson\n"));
        assert!(req.system.contains("TV show producer"));
        assert_eq!(req.max_tokens, 100);
    }

    #[test]
    fn test_interesting_prompt_limits() {
        let req = interesting_charge(&Charges::parse("A|B|C"));
        assert!(req.user.ends_with("3. C"));
        assert_eq!(req.max_tokens, 200);
    }

    #[test]
    fn test_reword_prompt_wraps_charge() {
        let req = reword_charge("UTTERING FORGED INSTRUMENT");
        assert_eq!(
            req.user,
            "Rewrite this charge description in plain English: \"{UTTERING FORGED INSTRUMENT}\""
        );
        assert!((req.temperature - 0.1).abs() < f32::EPSILON);
    }
}
