//! Mode router
//!
//! Turns each intent into a state change on the session store and picks the
//! voice and script for the reply. Every routing error is recovered locally
//! with a re-prompt; only an unknown session is reported to the caller.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::archive::OrderArchive;
use crate::content::ContentItem;
use crate::error::{SessionError, SessionResult};
use crate::events::SessionEvent;
use crate::session::{
    FieldValue, OrderField, OrderRecord, Persona, Record, SessionId, SessionStore, TutorMode,
    TutorState,
};

use super::intent::{normalize_milk, Intent, IntentClassifier, RuleClassifier};
use super::template::{assess_explanation, ScriptTemplate};
use super::voice::VoiceTable;

/// State change made by a turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StateMutation {
    FieldSet { field: OrderField, value: FieldValue },
    FocusChanged { field: OrderField },
    ModeSwitched { from: TutorMode, to: TutorMode },
    TopicSelected { topic: String },
}

/// The router's answer for one turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDecision {
    /// Voice identity for the speech collaborator
    pub voice: String,
    pub template: ScriptTemplate,
    pub mutation: Option<StateMutation>,
}

impl RouteDecision {
    pub fn prompt(&self) -> String {
        self.template.render()
    }
}

pub struct ModeRouter {
    store: SessionStore,
    voices: VoiceTable,
    classifier: Box<dyn IntentClassifier>,
    event_tx: broadcast::Sender<SessionEvent>,
    archive: Option<OrderArchive>,
    /// Barista fields the customer asked to revisit
    requested: HashMap<SessionId, OrderField>,
}

impl ModeRouter {
    pub fn new(
        store: SessionStore,
        voices: VoiceTable,
        event_tx: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            store,
            voices,
            classifier: Box::new(RuleClassifier::new()),
            event_tx,
            archive: None,
            requested: HashMap::new(),
        }
    }

    /// Archive completed orders into `archive`
    pub fn with_archive(mut self, archive: OrderArchive) -> Self {
        self.archive = Some(archive);
        self
    }

    pub fn with_classifier(mut self, classifier: Box<dyn IntentClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn get(&self, id: &SessionId) -> SessionResult<&Record> {
        self.store.get(id)
    }

    pub fn is_complete(&self, id: &SessionId) -> SessionResult<bool> {
        self.store.is_complete(id)
    }

    pub fn topics(&self) -> Vec<ContentItem> {
        self.store.content().iter().cloned().collect()
    }

    /// Open a session and produce its greeting
    pub fn start_session(&mut self, persona: Persona) -> (SessionId, RouteDecision) {
        let id = self.store.create(persona);
        self.emit(SessionEvent::SessionStarted {
            session_id: id,
            persona,
        });
        let decision = self.decide(
            &Record::empty(persona),
            ScriptTemplate::Greeting { persona },
            None,
        );
        (id, decision)
    }

    /// Close a session, returning its last record
    pub fn end_session(&mut self, id: &SessionId) -> SessionResult<Record> {
        let turns = self.store.session(id)?.turns;
        let record = self.store.end(id)?;
        self.requested.remove(id);
        self.emit(SessionEvent::SessionEnded {
            session_id: *id,
            turns,
        });
        Ok(record)
    }

    /// Classify a raw utterance with the built-in classifier, then route it
    pub fn handle_utterance(&mut self, id: &SessionId, text: &str) -> SessionResult<RouteDecision> {
        let record = self.store.get(id)?;
        let persona = record.persona();
        let topic_set = matches!(record, Record::Tutor(TutorState { topic: Some(_), .. }));
        debug!(session_id = %id, %persona, text, "utterance received");

        let intent = match self.classifier.classify(persona, text) {
            Ok(intent) => intent,
            Err(err) => {
                self.count_turn(id)?;
                return self.reprompt(id, err);
            }
        };

        // Mid-topic, a phrase that names no content is part of an answer
        let intent = match intent {
            Intent::SwitchTopic { topic }
                if topic_set && self.store.content().find(&topic).is_none() =>
            {
                debug!(session_id = %id, %topic, "no such topic, treating as answer");
                Intent::answer(text.trim())
            }
            other => other,
        };

        self.route_intent(id, intent)
    }

    /// Route an already classified intent.
    ///
    /// Fails only for an unknown session; every other error becomes a
    /// re-prompt and leaves the record untouched.
    pub fn route_intent(&mut self, id: &SessionId, intent: Intent) -> SessionResult<RouteDecision> {
        self.count_turn(id)?;
        debug!(session_id = %id, ?intent, "routing intent");

        match self.apply(id, intent) {
            Ok(decision) => Ok(decision),
            Err(err) => self.reprompt(id, err),
        }
    }

    fn count_turn(&mut self, id: &SessionId) -> SessionResult<()> {
        self.store.session_mut(id)?.turns += 1;
        Ok(())
    }

    fn apply(&mut self, id: &SessionId, intent: Intent) -> SessionResult<RouteDecision> {
        match self.store.get(id)?.clone() {
            Record::Barista(order) => self.apply_barista(id, &order, intent),
            Record::Tutor(state) => self.apply_tutor(id, &state, intent),
        }
    }

    fn apply_barista(
        &mut self,
        id: &SessionId,
        order: &OrderRecord,
        intent: Intent,
    ) -> SessionResult<RouteDecision> {
        match intent {
            Intent::SetField { field, value } => {
                let field: OrderField = field.parse()?;
                self.fill(id, order, field, value)
            }
            Intent::FocusField { field } => {
                let field: OrderField = field.parse()?;
                self.requested.insert(*id, field);
                debug!(session_id = %id, %field, "field requested");
                Ok(self.decide(
                    self.store.get(id)?,
                    ScriptTemplate::AskField { field },
                    Some(StateMutation::FocusChanged { field }),
                ))
            }
            Intent::Answer { text } => {
                // A finished order only changes through a requested field
                let target = match self.requested.get(id) {
                    Some(field) => Some(*field),
                    None if order.is_complete() => None,
                    None => order.next_missing(),
                };
                match target {
                    Some(field) => self.fill(id, order, field, answer_value(field, &text)),
                    None => Ok(self.decide(
                        self.store.get(id)?,
                        ScriptTemplate::ConfirmOrder {
                            order: order.clone(),
                        },
                        None,
                    )),
                }
            }
            Intent::SwitchMode { .. } => Err(SessionError::InvalidField {
                field: "mode".into(),
            }),
            Intent::SwitchTopic { .. } => Err(SessionError::InvalidField {
                field: "topic".into(),
            }),
        }
    }

    fn fill(
        &mut self,
        id: &SessionId,
        before: &OrderRecord,
        field: OrderField,
        value: FieldValue,
    ) -> SessionResult<RouteDecision> {
        self.store.set_field(id, field.as_str(), value)?;
        self.requested.remove(id);

        let record = self.store.get(id)?.clone();
        let Record::Barista(order) = &record else {
            return Err(SessionError::InvalidField {
                field: field.to_string(),
            });
        };

        let value = order.value(field);
        self.emit(SessionEvent::FieldFilled {
            session_id: *id,
            field,
            value: value.clone(),
        });

        if order.is_complete() {
            if !before.is_complete() {
                self.complete_order(id, order, false);
            } else if before.value(field) != value {
                self.complete_order(id, order, true);
            }
        }

        let template = match order.next_missing() {
            Some(next) if !order.is_complete() => ScriptTemplate::AskField { field: next },
            _ => ScriptTemplate::ConfirmOrder {
                order: order.clone(),
            },
        };
        Ok(self.decide(&record, template, Some(StateMutation::FieldSet { field, value })))
    }

    /// Publish and archive a finished order. A correction overwrites the archived copy.
    fn complete_order(&self, id: &SessionId, order: &OrderRecord, corrected: bool) {
        let event = if corrected {
            info!(session_id = %id, order = %order.describe(), "order updated");
            SessionEvent::OrderUpdated {
                session_id: *id,
                order: order.clone(),
            }
        } else {
            info!(session_id = %id, order = %order.describe(), "order complete");
            SessionEvent::OrderCompleted {
                session_id: *id,
                order: order.clone(),
            }
        };
        self.emit(event);

        if let Some(archive) = &self.archive {
            if let Err(e) = archive.save(*id, order) {
                error!(?e, session_id = %id, "failed to archive order");
            }
        }
    }

    fn apply_tutor(
        &mut self,
        id: &SessionId,
        before: &TutorState,
        intent: Intent,
    ) -> SessionResult<RouteDecision> {
        match intent {
            Intent::SwitchMode { mode } => {
                self.store.set_field(id, "mode", mode.as_str().into())?;
            }
            Intent::SwitchTopic { topic } => {
                let topic_id = self.resolve_topic(&topic)?;
                self.store.set_field(id, "topic", topic_id.into())?;
            }
            Intent::SetField { field, value } => {
                self.store.set_field(id, &field, value)?;
            }
            Intent::FocusField { field } => {
                return Err(SessionError::InvalidField { field });
            }
            Intent::Answer { text } => return self.answer_tutor(id, before, &text),
        }

        let record = self.store.get(id)?;
        let Record::Tutor(after) = record else {
            return Err(SessionError::InvalidField { field: "mode".into() });
        };
        let mutation = self.tutor_mutation(id, before, after);
        let template = self.entry_template(after)?;
        Ok(self.decide(record, template, mutation))
    }

    /// Learn plays the summary, quiz poses the question, teach-back gives feedback
    fn answer_tutor(
        &mut self,
        id: &SessionId,
        state: &TutorState,
        text: &str,
    ) -> SessionResult<RouteDecision> {
        let Some(topic) = &state.topic else {
            // No topic yet: the answer may be the topic itself
            let found = self.store.content().find(text).map(|item| item.id.clone());
            return match found {
                Some(topic) => self.apply_tutor(id, state, Intent::SwitchTopic { topic }),
                None => {
                    let titles = self.store.content().titles();
                    let record = self.store.get(id)?;
                    Ok(self.decide(record, ScriptTemplate::ChooseTopic { titles }, None))
                }
            };
        };

        let item = self.store.content().get(topic)?.clone();
        let template = match state.mode {
            TutorMode::Learn => ScriptTemplate::LearnSummary {
                title: item.title,
                summary: item.summary,
            },
            TutorMode::Quiz => ScriptTemplate::QuizQuestion {
                title: item.title,
                question: item.sample_question,
            },
            TutorMode::TeachBack => {
                let (coverage, missing) = assess_explanation(&item.summary, text);
                info!(session_id = %id, topic = %item.id, coverage, "teach-back assessed");
                ScriptTemplate::TeachBackFeedback {
                    title: item.title,
                    coverage,
                    missing,
                }
            }
        };
        Ok(self.decide(self.store.get(id)?, template, None))
    }

    fn resolve_topic(&self, phrase: &str) -> SessionResult<String> {
        self.store
            .content()
            .find(phrase)
            .map(|item| item.id.clone())
            .ok_or_else(|| SessionError::topic_not_found(phrase))
    }

    /// Emit events for what changed; switching to the active mode changes nothing
    fn tutor_mutation(
        &self,
        id: &SessionId,
        before: &TutorState,
        after: &TutorState,
    ) -> Option<StateMutation> {
        let mut mutation = None;

        if before.topic != after.topic {
            if let Some(topic) = &after.topic {
                info!(session_id = %id, %topic, "topic selected");
                self.emit(SessionEvent::TopicSelected {
                    session_id: *id,
                    topic: topic.clone(),
                });
                mutation = Some(StateMutation::TopicSelected {
                    topic: topic.clone(),
                });
            }
        }

        if before.mode != after.mode {
            info!(session_id = %id, from = %before.mode, to = %after.mode, "mode switched");
            self.emit(SessionEvent::ModeSwitched {
                session_id: *id,
                from: before.mode,
                to: after.mode,
            });
            mutation = Some(StateMutation::ModeSwitched {
                from: before.mode,
                to: after.mode,
            });
        }

        mutation
    }

    /// What the tutor says on entering a mode or topic
    fn entry_template(&self, state: &TutorState) -> SessionResult<ScriptTemplate> {
        let content = self.store.content();
        let Some(topic) = &state.topic else {
            return Ok(ScriptTemplate::ChooseTopic {
                titles: content.titles(),
            });
        };

        let item = content.get(topic)?;
        Ok(match state.mode {
            TutorMode::Learn => ScriptTemplate::LearnSummary {
                title: item.title.clone(),
                summary: item.summary.clone(),
            },
            TutorMode::Quiz => ScriptTemplate::QuizQuestion {
                title: item.title.clone(),
                question: item.sample_question.clone(),
            },
            TutorMode::TeachBack => ScriptTemplate::TeachBackPrompt {
                title: item.title.clone(),
            },
        })
    }

    fn reprompt(&self, id: &SessionId, err: SessionError) -> SessionResult<RouteDecision> {
        let record = self.store.get(id)?;
        warn!(session_id = %id, error = %err, "turn not applied, re-prompting");
        self.emit(SessionEvent::Reprompted {
            session_id: *id,
            code: err.code().to_string(),
        });
        Ok(self.decide(
            record,
            ScriptTemplate::Reprompt {
                reason: err.to_string(),
            },
            None,
        ))
    }

    fn decide(
        &self,
        record: &Record,
        template: ScriptTemplate,
        mutation: Option<StateMutation>,
    ) -> RouteDecision {
        RouteDecision {
            voice: self.voices.for_record(record).to_string(),
            template,
            mutation,
        }
    }

    fn emit(&self, event: SessionEvent) {
        debug!(%event, "emitting session event");
        let _ = self.event_tx.send(event);
    }
}

/// Shape a bare answer for the field it fills
fn answer_value(field: OrderField, text: &str) -> FieldValue {
    let text = text.trim().trim_end_matches(['.', '!', '?']);
    match field {
        OrderField::Milk => FieldValue::Text(normalize_milk(text)),
        OrderField::DrinkType | OrderField::Size => FieldValue::Text(text.to_lowercase()),
        OrderField::Extras | OrderField::Name => FieldValue::Text(text.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::content::ContentLibrary;

    fn create_router() -> (ModeRouter, broadcast::Receiver<SessionEvent>) {
        let content = Arc::new(ContentLibrary::bundled().unwrap());
        let (tx, rx) = broadcast::channel(64);
        let router = ModeRouter::new(SessionStore::new(content), VoiceTable::default(), tx);
        (router, rx)
    }

    fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn tutor_state(router: &ModeRouter, id: &SessionId) -> TutorState {
        match router.get(id).unwrap() {
            Record::Tutor(state) => state.clone(),
            other => panic!("expected tutor record, got {other:?}"),
        }
    }

    #[test]
    fn test_coffee_order_scenario() {
        let (mut router, _rx) = create_router();
        let (id, greeting) = router.start_session(Persona::Barista);
        assert_eq!(greeting.voice, "Natalie");

        let utterances = ["I'd like a latte", "large", "oat milk", "no extras", "name: Sam"];
        for (i, utterance) in utterances.iter().enumerate() {
            assert!(!router.is_complete(&id).unwrap());
            router.handle_utterance(&id, utterance).unwrap();
            assert_eq!(router.is_complete(&id).unwrap(), i == utterances.len() - 1);
        }

        let json = serde_json::to_value(match router.get(&id).unwrap() {
            Record::Barista(order) => order,
            other => panic!("expected order, got {other:?}"),
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "drinkType": "latte",
                "size": "large",
                "milk": "oat",
                "extras": [],
                "name": "Sam"
            })
        );
    }

    #[test]
    fn test_barista_asks_next_field_and_confirms() {
        let (mut router, mut rx) = create_router();
        let (id, _) = router.start_session(Persona::Barista);

        let decision = router.handle_utterance(&id, "cappuccino").unwrap();
        assert_eq!(decision.template, ScriptTemplate::AskField { field: OrderField::Size });
        assert_eq!(
            decision.mutation,
            Some(StateMutation::FieldSet {
                field: OrderField::DrinkType,
                value: "cappuccino".into(),
            })
        );

        router.handle_utterance(&id, "small").unwrap();
        router.handle_utterance(&id, "whole").unwrap();
        router.handle_utterance(&id, "with vanilla").unwrap();
        let decision = router.handle_utterance(&id, "Jo").unwrap();
        assert!(matches!(decision.template, ScriptTemplate::ConfirmOrder { .. }));
        assert_eq!(
            decision.prompt(),
            "Perfect, that's a small cappuccino with whole milk, plus vanilla, for Jo. It'll be ready shortly!"
        );

        let completed = drain(&mut rx)
            .into_iter()
            .filter(|e| matches!(e, SessionEvent::OrderCompleted { .. }))
            .count();
        assert_eq!(completed, 1);
    }

    #[test]
    fn test_focus_field_correction_overwrites() {
        let (mut router, _rx) = create_router();
        let (id, _) = router.start_session(Persona::Barista);
        router.handle_utterance(&id, "I'd like a mocha").unwrap();
        router.handle_utterance(&id, "small").unwrap();

        let decision = router.handle_utterance(&id, "actually, change the size").unwrap();
        assert_eq!(decision.template, ScriptTemplate::AskField { field: OrderField::Size });
        router.handle_utterance(&id, "Large").unwrap();

        match router.get(&id).unwrap() {
            Record::Barista(order) => {
                assert_eq!(order.size, "large");
                assert!(order.milk.is_empty());
            }
            other => panic!("expected order, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_field_reprompts_without_mutation() {
        let (mut router, mut rx) = create_router();
        let (id, _) = router.start_session(Persona::Barista);
        let before = router.get(&id).unwrap().clone();
        drain(&mut rx);

        let decision = router
            .route_intent(
                &id,
                Intent::SetField {
                    field: "temperature".into(),
                    value: "hot".into(),
                },
            )
            .unwrap();
        assert!(matches!(decision.template, ScriptTemplate::Reprompt { .. }));
        assert_eq!(decision.voice, "Natalie");
        assert!(decision.mutation.is_none());
        assert_eq!(router.get(&id).unwrap(), &before);
        assert_eq!(
            drain(&mut rx),
            vec![SessionEvent::Reprompted {
                session_id: id,
                code: "invalid_field".into()
            }]
        );
    }

    #[test]
    fn test_switch_to_quiz_keeps_topic_and_selects_alicia() {
        let (mut router, _rx) = create_router();
        let (id, greeting) = router.start_session(Persona::Tutor);
        assert_eq!(greeting.voice, "Matthew");

        let decision = router.handle_utterance(&id, "let's learn about loops").unwrap();
        assert!(matches!(decision.template, ScriptTemplate::LearnSummary { .. }));
        assert_eq!(tutor_state(&router, &id).mode, TutorMode::Learn);

        let decision = router.handle_utterance(&id, "Switch to quiz mode").unwrap();
        assert_eq!(decision.voice, "Alicia");
        assert_eq!(
            decision.mutation,
            Some(StateMutation::ModeSwitched {
                from: TutorMode::Learn,
                to: TutorMode::Quiz,
            })
        );
        assert!(matches!(decision.template, ScriptTemplate::QuizQuestion { .. }));
        assert_eq!(
            tutor_state(&router, &id),
            TutorState {
                mode: TutorMode::Quiz,
                topic: Some("loops".into()),
            }
        );
    }

    #[test]
    fn test_mode_switch_is_idempotent() {
        let (mut router, mut rx) = create_router();
        let (id, _) = router.start_session(Persona::Tutor);
        router.handle_utterance(&id, "switch to quiz mode").unwrap();
        let before = tutor_state(&router, &id);
        drain(&mut rx);

        let decision = router.handle_utterance(&id, "switch to quiz mode").unwrap();
        assert!(decision.mutation.is_none());
        assert_eq!(tutor_state(&router, &id), before);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_ambiguous_switch_reprompts() {
        let (mut router, _rx) = create_router();
        let (id, _) = router.start_session(Persona::Tutor);
        let decision = router
            .handle_utterance(&id, "go to quiz or teach back mode")
            .unwrap();
        assert!(matches!(decision.template, ScriptTemplate::Reprompt { .. }));
        assert_eq!(tutor_state(&router, &id), TutorState::default());
    }

    #[test]
    fn test_tutor_without_topic_offers_choices() {
        let (mut router, _rx) = create_router();
        let (id, _) = router.start_session(Persona::Tutor);

        let decision = router.handle_utterance(&id, "hmm not sure").unwrap();
        assert!(matches!(decision.template, ScriptTemplate::ChooseTopic { .. }));

        // A bare topic name picks the topic
        let decision = router.handle_utterance(&id, "functions").unwrap();
        assert_eq!(
            decision.mutation,
            Some(StateMutation::TopicSelected {
                topic: "functions".into()
            })
        );
    }

    #[test]
    fn test_unknown_topic_reprompts() {
        let (mut router, _rx) = create_router();
        let (id, _) = router.start_session(Persona::Tutor);
        let decision = router.handle_utterance(&id, "let's learn about astronomy").unwrap();
        assert!(matches!(decision.template, ScriptTemplate::Reprompt { .. }));
        assert!(tutor_state(&router, &id).topic.is_none());
    }

    #[test]
    fn test_teach_back_feedback() {
        let (mut router, _rx) = create_router();
        let (id, _) = router.start_session(Persona::Tutor);
        router.handle_utterance(&id, "let's learn about loops").unwrap();

        let decision = router.handle_utterance(&id, "switch to teach back mode").unwrap();
        assert_eq!(decision.voice, "Ken");
        assert_eq!(
            decision.template,
            ScriptTemplate::TeachBackPrompt { title: "Loops".into() }
        );

        let decision = router
            .handle_utterance(&id, "A loop repeats a block of code while a condition holds")
            .unwrap();
        match decision.template {
            ScriptTemplate::TeachBackFeedback { coverage, .. } => assert!(coverage > 0),
            other => panic!("expected feedback, got {other:?}"),
        }
    }

    #[test]
    fn test_teach_back_explanation_with_switch_words_gets_feedback() {
        let (mut router, _rx) = create_router();
        let (id, _) = router.start_session(Persona::Tutor);
        router.handle_utterance(&id, "let's learn about loops").unwrap();
        router.handle_utterance(&id, "switch to teach back mode").unwrap();

        for explanation in [
            "Loops repeat a block of code and go to the next element in a collection",
            "You study each element of a collection and repeat the code block while a condition holds",
            "Study how a block of code repeats while a condition holds",
        ] {
            let decision = router.handle_utterance(&id, explanation).unwrap();
            assert_eq!(decision.voice, "Ken");
            assert!(decision.mutation.is_none());
            match decision.template {
                ScriptTemplate::TeachBackFeedback { title, coverage, .. } => {
                    assert_eq!(title, "Loops");
                    assert!(coverage > 0);
                }
                other => panic!("expected feedback for {explanation:?}, got {other:?}"),
            }
        }

        assert_eq!(
            tutor_state(&router, &id),
            TutorState {
                mode: TutorMode::TeachBack,
                topic: Some("loops".into()),
            }
        );
    }

    #[test]
    fn test_completed_order_ignores_chatter() {
        let (mut router, mut rx) = create_router();
        let (id, _) = router.start_session(Persona::Barista);

        for utterance in ["I'd like a latte", "large", "oat milk"] {
            router.handle_utterance(&id, utterance).unwrap();
        }
        // Name given before extras: the order is complete, so it is confirmed
        let decision = router.handle_utterance(&id, "name: Sam").unwrap();
        assert!(matches!(decision.template, ScriptTemplate::ConfirmOrder { .. }));
        let before = router.get(&id).unwrap().clone();
        drain(&mut rx);

        let decision = router.handle_utterance(&id, "Thank you!").unwrap();
        assert!(matches!(decision.template, ScriptTemplate::ConfirmOrder { .. }));
        assert!(decision.mutation.is_none());
        assert_eq!(router.get(&id).unwrap(), &before);
        assert!(drain(&mut rx).is_empty());

        // Extras can still be added explicitly
        let decision = router.handle_utterance(&id, "add caramel").unwrap();
        assert_eq!(
            decision.mutation,
            Some(StateMutation::FieldSet {
                field: OrderField::Extras,
                value: FieldValue::List(vec!["caramel".into()]),
            })
        );
    }

    #[test]
    fn test_correction_after_completion_updates_archive() {
        let dir = tempfile::tempdir().unwrap();
        let (router, mut rx) = create_router();
        let archive = OrderArchive::new(dir.path());
        let mut router = router.with_archive(archive.clone());

        let (id, _) = router.start_session(Persona::Barista);
        for utterance in ["I'd like a latte", "large", "oat milk", "no extras", "name: Sam"] {
            router.handle_utterance(&id, utterance).unwrap();
        }
        assert_eq!(archive.load(id).unwrap().order.milk, "oat");
        drain(&mut rx);

        router.handle_utterance(&id, "change the milk").unwrap();
        let decision = router.handle_utterance(&id, "almond").unwrap();
        match &decision.template {
            ScriptTemplate::ConfirmOrder { order } => assert_eq!(order.milk, "almond"),
            other => panic!("expected confirmation, got {other:?}"),
        }

        assert_eq!(archive.load(id).unwrap().order.milk, "almond");
        let updates: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter(|e| {
                matches!(
                    e,
                    SessionEvent::OrderUpdated { .. } | SessionEvent::OrderCompleted { .. }
                )
            })
            .collect();
        assert!(matches!(
            updates.as_slice(),
            [SessionEvent::OrderUpdated { order, .. }] if order.milk == "almond"
        ));
    }

    #[test]
    fn test_barista_rejects_mode_switch() {
        let (mut router, _rx) = create_router();
        let (id, _) = router.start_session(Persona::Barista);
        let decision = router
            .route_intent(&id, Intent::SwitchMode { mode: TutorMode::Quiz })
            .unwrap();
        assert!(matches!(decision.template, ScriptTemplate::Reprompt { .. }));
    }

    #[test]
    fn test_unknown_session_is_an_error() {
        let (mut router, _rx) = create_router();
        let id = uuid::Uuid::new_v4();
        assert!(matches!(
            router.handle_utterance(&id, "hello"),
            Err(SessionError::NotFound { kind: "session", .. })
        ));
        assert!(router.end_session(&id).is_err());
    }

    #[test]
    fn test_completed_order_is_archived() {
        let dir = tempfile::tempdir().unwrap();
        let (router, _rx) = create_router();
        let archive = OrderArchive::new(dir.path());
        let mut router = router.with_archive(archive.clone());

        let (id, _) = router.start_session(Persona::Barista);
        for utterance in ["I'd like a latte", "large", "oat milk", "no extras", "name: Sam"] {
            router.handle_utterance(&id, utterance).unwrap();
        }

        let saved = archive.load(id).unwrap();
        assert_eq!(saved.order.name, "Sam");
        assert_eq!(saved.order.milk, "oat");
    }

    #[test]
    fn test_end_session_emits_turn_count() {
        let (mut router, mut rx) = create_router();
        let (id, _) = router.start_session(Persona::Tutor);
        router.handle_utterance(&id, "quiz me").unwrap();
        router.end_session(&id).unwrap();

        let last = drain(&mut rx).pop().unwrap();
        assert_eq!(last, SessionEvent::SessionEnded { session_id: id, turns: 1 });
        assert!(router.get(&id).is_err());
    }
}
