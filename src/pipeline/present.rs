//! Shape stage artifacts into the display-ready package fields.

use crate::types::{AnswerSheet, ConceptCard, ConceptSet, Explanation, HierarchyNode, QuizItem, TieredQuiz};

/// Level given to concepts not found in the hierarchy.
const DEFAULT_LEVEL: usize = 1;

/// Questions in easy, medium, hard order, each tagged with its tier and
/// carrying its answer when one exists.
pub fn flatten_quiz(quiz: &TieredQuiz, answers: &AnswerSheet) -> Vec<QuizItem> {
    quiz.questions()
        .map(|(tier, question)| {
            let answer = answers.get(&question.id);
            QuizItem {
                id: question.id.clone(),
                question: question.question.clone(),
                kind: question.kind,
                options: question.options.clone(),
                difficulty: tier,
                answer: answer.map(|a| a.answer.clone()),
                explanation: answer.map(|a| a.explanation.clone()),
            }
        })
        .collect()
}

/// One card per concept.
///
/// The level is the depth of the first node (pre-order) whose name contains
/// the concept, ignoring case. Substring matching can place a concept under
/// an unrelated node that merely contains its name.
pub fn concept_cards(
    concepts: &ConceptSet,
    hierarchy: &HierarchyNode,
    explanation: &Explanation,
) -> Vec<ConceptCard> {
    concepts
        .iter()
        .map(|concept| {
            let found = hierarchy.find_containing(concept);
            ConceptCard {
                title: concept.to_string(),
                explanation: explanation.for_concept(concept).unwrap_or_default().to_string(),
                level: found.map_or(DEFAULT_LEVEL, |(depth, _)| depth),
                sub_concepts: found
                    .map(|(_, node)| node.children.iter().map(|c| c.name.clone()).collect())
                    .unwrap_or_default(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Answer, ConceptExplanation, QuestionKind, QuizQuestion, Tier};

    fn question(id: &str, kind: QuestionKind) -> QuizQuestion {
        QuizQuestion {
            id: id.into(),
            question: format!("{id}?"),
            kind,
            options: match kind {
                QuestionKind::MultipleChoice => vec!["yes".into(), "no".into()],
                QuestionKind::ShortAnswer => Vec::new(),
            },
        }
    }

    #[test]
    fn flatten_orders_tiers_and_attaches_answers() {
        let quiz = TieredQuiz {
            easy: vec![question("E1", QuestionKind::MultipleChoice)],
            medium: vec![question("M1", QuestionKind::ShortAnswer)],
            hard: vec![question("H1", QuestionKind::ShortAnswer)],
        };
        let answers = AnswerSheet {
            answers: vec![
                Answer {
                    id: "H1".into(),
                    answer: "Because".into(),
                    explanation: "Reasoning".into(),
                },
                Answer {
                    id: "E1".into(),
                    answer: "yes".into(),
                    explanation: String::new(),
                },
            ],
        };

        let items = flatten_quiz(&quiz, &answers);
        let order: Vec<(&str, Tier)> = items.iter().map(|i| (i.id.as_str(), i.difficulty)).collect();
        assert_eq!(
            order,
            vec![("E1", Tier::Easy), ("M1", Tier::Medium), ("H1", Tier::Hard)]
        );
        assert_eq!(items[0].answer.as_deref(), Some("yes"));
        assert_eq!(items[0].options.len(), 2);
        assert!(items[1].answer.is_none());
        assert!(items[1].explanation.is_none());
        assert_eq!(items[2].explanation.as_deref(), Some("Reasoning"));
    }

    #[test]
    fn cards_take_level_children_and_explanation() {
        let tree = HierarchyNode::new(
            "Photosynthesis",
            vec![HierarchyNode::new(
                "Light Reactions",
                vec![HierarchyNode::leaf("Chlorophyll"), HierarchyNode::leaf("Photosystem II")],
            )],
        );
        let concepts = ConceptSet::from(vec![
            "Photosynthesis".to_string(),
            "light reactions".to_string(),
            "Chlorophyll".to_string(),
            "Stomata".to_string(),
        ]);
        let explanation = Explanation {
            concept_explanations: vec![ConceptExplanation {
                concept: "CHLOROPHYLL".into(),
                explanation: "Green pigment".into(),
            }],
            ..Default::default()
        };

        let cards = concept_cards(&concepts, &tree, &explanation);
        assert_eq!(cards.len(), 4);

        assert_eq!(cards[0].level, 1);
        assert_eq!(cards[0].sub_concepts, vec!["Light Reactions".to_string()]);

        assert_eq!(cards[1].level, 2);
        assert_eq!(cards[1].sub_concepts.len(), 2);

        assert_eq!(cards[2].level, 3);
        assert_eq!(cards[2].explanation, "Green pigment");
        assert!(cards[2].sub_concepts.is_empty());

        // not in the tree
        assert_eq!(cards[3].level, 1);
        assert!(cards[3].sub_concepts.is_empty());
        assert_eq!(cards[3].explanation, "");
    }

    #[test]
    fn substring_match_can_misplace_a_concept() {
        let tree = HierarchyNode::new(
            "Biology",
            vec![HierarchyNode::new(
                "Cell Division",
                vec![HierarchyNode::leaf("Cell")],
            )],
        );
        let concepts = ConceptSet::from(vec!["Cell".to_string()]);
        let cards = concept_cards(&concepts, &tree, &Explanation::default());
        // "Cell Division" is reached before the "Cell" leaf
        assert_eq!(cards[0].level, 2);
        assert_eq!(cards[0].sub_concepts, vec!["Cell".to_string()]);
    }
}
