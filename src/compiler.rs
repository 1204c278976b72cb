//! Pattern to wiring-diagram compiler.
//!
//! Compilation is a pure function of a pattern and its resolved parameters.
//! It runs in fixed stages:
//!
//! 1. five context extractors (`self`, `pred`, `succ`, `prev`, `neighbors`)
//! 2. one condition sensor chosen by mix-mode
//! 3. the action path: one mixer chosen by mix-mode, plus a trailing left
//!    shift when a rotation is requested and the mixer is not itself a shift
//! 4. the fallback path chosen by the preservation tag
//! 5. a threshold gate selecting action (above) or fallback (below)
//! 6. optional inversion on bit 0 of the secondary code
//! 7. optional probabilistic gating on a self-balance score
//! 8. the output terminal
//!
//! Context extractors are always emitted; the unused ones are sources and
//! are legal in a validated diagram.

use crate::arena::NodeIdx;
use crate::component::{Component, Literal, Port};
use crate::diagram::{DiagramBuilder, DiagramMeta, StructuralError, WiringDiagram};
use crate::params::{MixMode, ParameterRecord, Preservation};
use crate::pattern::{Clause, Pattern};
use crate::resolver::Resolution;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Fixed constants of the compilation scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    /// Crossover point for `swap-halves`.
    pub crossover_point: u32,
    /// Secondary-code bit that inverts the gate.
    pub secondary_bit: u32,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            crossover_point: 4,
            secondary_bit: 0,
        }
    }
}

/// Sensor measuring the condition for a mix-mode.
pub fn condition_metric(mix: MixMode) -> Component {
    match mix {
        MixMode::Majority => Component::Diversity,
        MixMode::XorNeighbor | MixMode::Scramble => Component::Similarity,
        MixMode::RotateLeft | MixMode::RotateRight | MixMode::Reverse | MixMode::SwapHalves => Component::Entropy,
        // self-stability: how much the cell changed since last generation
        MixMode::None => Component::Similarity,
    }
}

/// Mixer realising the action for a mix-mode; `None` is the identity.
pub fn action_mixer(mix: MixMode) -> Option<Component> {
    match mix {
        MixMode::None => None,
        MixMode::RotateLeft => Some(Component::ShiftLeft),
        MixMode::RotateRight => Some(Component::ShiftRight),
        MixMode::Reverse => Some(Component::BitNot),
        MixMode::XorNeighbor => Some(Component::BitXor),
        MixMode::Scramble => Some(Component::Mutate),
        MixMode::Majority => Some(Component::MajorityVote),
        MixMode::SwapHalves => Some(Component::Crossover),
    }
}

/// Extractor handles shared by every stage.
struct Context {
    this: NodeIdx,
    pred: NodeIdx,
    succ: NodeIdx,
    prev: NodeIdx,
    neighbors: NodeIdx,
}

/// Compiles patterns into wiring diagrams.
#[derive(Debug, Clone, Copy, Default)]
pub struct WiringCompiler {
    options: CompilerOptions,
}

impl WiringCompiler {
    pub fn new(options: CompilerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> CompilerOptions {
        self.options
    }

    /// Compiles `pattern` with its resolved parameters.
    pub fn compile(&self, pattern: &Pattern, resolution: &Resolution) -> Result<WiringDiagram, StructuralError> {
        let params = &resolution.params;
        let meta = DiagramMeta {
            id: pattern.id.clone(),
            title: pattern.title.clone(),
            bits: resolution.code,
            provenance: resolution.provenance,
            params: *params,
            formula: None,
        };
        let mut b = DiagramBuilder::new(meta);
        let mut notes = Vec::new();

        let ctx = Context {
            this: b.node("self", Component::ContextSelf),
            pred: b.node("pred", Component::ContextPred),
            succ: b.node("succ", Component::ContextSucc),
            prev: b.node("prev", Component::ContextPrev),
            neighbors: b.node("neighbors", Component::ContextNeighbors),
        };

        let sensor = condition_metric(params.mix_mode);
        let condition = b.node(format!("condition-{}", sensor.name()), sensor);
        let sensed = match sensor {
            Component::Similarity => {
                b.wire(ctx.this, condition, Port::A).wire(ctx.prev, condition, Port::B);
                "self, prev"
            }
            _ => {
                b.wire(ctx.neighbors, condition, Port::Sigils);
                "neighbors"
            }
        };
        debug!(pattern = %pattern.id, sensor = sensor.name(), "condition sensor selected");
        notes.push(clause_note(
            pattern,
            Clause::Condition,
            format!("{}({}) >= {:.2}", sensor.name(), sensed, params.match_threshold),
        ));

        let (action, action_text) = self.action_path(&mut b, &ctx, params);
        debug!(pattern = %pattern.id, action = %action_text, "action path built");
        notes.push(clause_note(pattern, Clause::Action, action_text));

        let (fallback, fallback_text) = fallback_path(&mut b, &ctx, pattern.preservation());
        debug!(pattern = %pattern.id, preservation = ?pattern.preservation(), "fallback path built");
        notes.push(clause_note(pattern, Clause::Fallback, fallback_text.to_string()));

        let gate = b.node("gate", Component::ThresholdSelect);
        b.wire(condition, gate, Port::Score)
            .literal(Literal::Real(params.match_threshold), gate, Some(Port::Threshold))
            .wire(action, gate, Port::Above)
            .wire(fallback, gate, Port::Below);
        let mut active = gate;

        if params.invert_on_secondary {
            let exotype = b.node("exotype", Component::ContextExotype);
            let bit = b.node(format!("exotype-bit{}", self.options.secondary_bit), Component::BitTest);
            let select = b.node("invert-select", Component::ConditionalSelect);
            b.wire(exotype, bit, Port::Sigil)
                .literal(Literal::Int(self.options.secondary_bit), bit, Some(Port::Bit))
                .wire(bit, select, Port::Cond)
                .wire(fallback, select, Port::Then)
                .wire(active, select, Port::Else);
            active = select;
            debug!(pattern = %pattern.id, bit = self.options.secondary_bit, "secondary-code inversion added");
            notes.push(format!(
                "inversion: take the fallback when bit {} of the secondary code is set",
                self.options.secondary_bit
            ));
        }

        if params.update_probability < 1.0 {
            let balance = b.node("balance", Component::Evenness);
            let update = b.node("update-gate", Component::ThresholdSelect);
            b.wire(ctx.this, balance, Port::Sigil)
                .wire(balance, update, Port::Score)
                .literal(Literal::Real(1.0 - params.update_probability), update, Some(Port::Threshold))
                .wire(active, update, Port::Above)
                .wire(ctx.this, update, Port::Below);
            active = update;
            debug!(pattern = %pattern.id, p = params.update_probability, "probabilistic gate added");
            notes.push(format!(
                "update: applies with probability {:.2}, otherwise the cell keeps its state",
                params.update_probability
            ));
        }

        let output = b.node("output", Component::Output);
        b.wire(active, output, Port::Sigil);
        if let Some(why) = pattern.clause(Clause::Justification) {
            notes.push(format!("because: {why}"));
        }
        b.interpretation(notes.join("\n"));

        let diagram = b.finish()?;
        debug!(
            pattern = %pattern.id,
            nodes = diagram.node_count(),
            edges = diagram.edge_count(),
            provenance = %resolution.provenance,
            "pattern compiled"
        );
        Ok(diagram)
    }

    fn action_path(&self, b: &mut DiagramBuilder, ctx: &Context, params: &ParameterRecord) -> (NodeIdx, String) {
        let mix = params.mix_mode;
        let (mut node, mut text) = match action_mixer(mix) {
            None => (ctx.this, "self (identity)".to_string()),
            Some(c @ (Component::ShiftLeft | Component::ShiftRight)) => {
                let amount = params.rotation.max(1);
                let n = b.node(format!("action-{}", c.name()), c);
                b.wire(ctx.this, n, Port::Sigil)
                    .literal(Literal::Int(amount), n, Some(Port::Amount));
                (n, format!("{}(self, {amount})", c.name()))
            }
            Some(c @ Component::BitNot) => {
                let n = b.node(format!("action-{}", c.name()), c);
                b.wire(ctx.this, n, Port::A);
                (n, format!("{}(self)", c.name()))
            }
            Some(c @ Component::BitXor) => {
                let n = b.node(format!("action-{}", c.name()), c);
                b.wire(ctx.pred, n, Port::A).wire(ctx.succ, n, Port::B);
                (n, format!("{}(pred, succ)", c.name()))
            }
            Some(c @ Component::Mutate) => {
                let n = b.node(format!("action-{}", c.name()), c);
                b.wire(ctx.this, n, Port::Sigil)
                    .literal(Literal::Real(params.update_probability), n, Some(Port::Rate));
                (n, format!("{}(self, {:.2})", c.name(), params.update_probability))
            }
            Some(c @ Component::MajorityVote) => {
                let n = b.node(format!("action-{}", c.name()), c);
                b.wire(ctx.neighbors, n, Port::Sigils);
                (n, format!("{}(neighbors)", c.name()))
            }
            Some(c) => {
                let n = b.node(format!("action-{}", c.name()), c);
                b.wire(ctx.this, n, Port::A)
                    .wire(ctx.pred, n, Port::B)
                    .literal(Literal::Int(self.options.crossover_point), n, Some(Port::Point));
                (n, format!("{}(self, pred, {})", c.name(), self.options.crossover_point))
            }
        };
        let is_shift = matches!(mix, MixMode::RotateLeft | MixMode::RotateRight);
        if params.rotation > 0 && !is_shift {
            let rotate = b.node("action-rotate", Component::ShiftLeft);
            b.wire(node, rotate, Port::Sigil)
                .literal(Literal::Int(params.rotation), rotate, Some(Port::Amount));
            node = rotate;
            text = format!("{}({text}, {})", Component::ShiftLeft.name(), params.rotation);
        }
        (node, text)
    }
}

fn fallback_path(b: &mut DiagramBuilder, ctx: &Context, tag: Preservation) -> (NodeIdx, &'static str) {
    match tag {
        Preservation::Full => (ctx.this, "self"),
        Preservation::None => (ctx.prev, "prev"),
        Preservation::Partial => {
            let avg = b.node("fallback-avg", Component::SigilAverage);
            b.wire(ctx.this, avg, Port::A).wire(ctx.prev, avg, Port::B);
            (avg, "sigil-avg(self, prev)")
        }
    }
}

fn clause_note(pattern: &Pattern, clause: Clause, wiring: String) -> String {
    let role = match clause {
        Clause::Condition => "condition",
        Clause::Action => "action",
        Clause::Fallback => "fallback",
        Clause::Justification => "justification",
    };
    match pattern.clause(clause) {
        Some(text) => format!("{role}: {wiring} -- {} {text}", clause.keyword()),
        None => format!("{role}: {wiring}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Analyzer;
    use crate::diagram::EdgeSource;
    use crate::eval::{evaluate_concrete, EvalError, EvalMode, Neighborhood};
    use crate::params::Provenance;
    use proptest::prelude::*;

    fn resolution(params: ParameterRecord) -> Resolution {
        Resolution {
            params,
            provenance: Provenance::Inline,
            code: None,
        }
    }

    fn compile(mix: MixMode, tag: Preservation, edit: impl FnOnce(&mut ParameterRecord)) -> WiringDiagram {
        let mut params = ParameterRecord {
            mix_mode: mix,
            ..ParameterRecord::default()
        };
        edit(&mut params);
        let pattern = Pattern::new("test/pattern").with_preservation(tag);
        WiringCompiler::default().compile(&pattern, &resolution(params)).unwrap()
    }

    fn component_of(d: &WiringDiagram, id: &str) -> Option<Component> {
        d.find(id).map(|i| d.node(i).component)
    }

    fn literal_at(d: &WiringDiagram, id: &str, port: Port) -> Option<Literal> {
        match d.input(d.find(id)?, port)? {
            EdgeSource::Literal(l) => Some(l),
            EdgeSource::Node(_) => None,
        }
    }

    #[test]
    fn context_extractors_always_present() {
        let d = compile(MixMode::None, Preservation::Full, |_| {});
        for (id, c) in [
            ("self", Component::ContextSelf),
            ("pred", Component::ContextPred),
            ("succ", Component::ContextSucc),
            ("prev", Component::ContextPrev),
            ("neighbors", Component::ContextNeighbors),
        ] {
            assert_eq!(component_of(&d, id), Some(c));
        }
        assert_eq!(component_of(&d, "gate"), Some(Component::ThresholdSelect));
        assert_eq!(d.node(d.output()).component, Component::Output);
    }

    #[test]
    fn sensor_selection_follows_mix_mode() {
        for (mix, sensor) in [
            (MixMode::Majority, Component::Diversity),
            (MixMode::XorNeighbor, Component::Similarity),
            (MixMode::Scramble, Component::Similarity),
            (MixMode::RotateLeft, Component::Entropy),
            (MixMode::RotateRight, Component::Entropy),
            (MixMode::Reverse, Component::Entropy),
            (MixMode::SwapHalves, Component::Entropy),
            (MixMode::None, Component::Similarity),
        ] {
            assert_eq!(condition_metric(mix), sensor);
            let d = compile(mix, Preservation::Partial, |_| {});
            let id = format!("condition-{}", sensor.name());
            assert_eq!(component_of(&d, &id), Some(sensor), "{mix}");
        }
    }

    #[test]
    fn similarity_compares_self_with_prev() {
        let d = compile(MixMode::None, Preservation::Partial, |_| {});
        let cond = d.find("condition-similarity").unwrap();
        assert_eq!(d.input(cond, Port::A), Some(EdgeSource::Node(d.find("self").unwrap())));
        assert_eq!(d.input(cond, Port::B), Some(EdgeSource::Node(d.find("prev").unwrap())));
    }

    #[test]
    fn mixer_selection_follows_mix_mode() {
        for mix in MixMode::ALL {
            let d = compile(mix, Preservation::Full, |_| {});
            match action_mixer(mix) {
                None => assert!(d.nodes().all(|(_, n)| !n.id.starts_with("action-"))),
                Some(c) => assert_eq!(component_of(&d, &format!("action-{}", c.name())), Some(c), "{mix}"),
            }
        }
    }

    #[test]
    fn rotate_uses_at_least_one_step() {
        let d = compile(MixMode::RotateLeft, Preservation::Full, |_| {});
        assert_eq!(literal_at(&d, "action-bit-shift-left", Port::Amount), Some(Literal::Int(1)));
        assert!(d.find("action-rotate").is_none());
        let d = compile(MixMode::RotateRight, Preservation::Full, |p| p.rotation = 3);
        assert_eq!(literal_at(&d, "action-bit-shift-right", Port::Amount), Some(Literal::Int(3)));
        assert!(d.find("action-rotate").is_none());
    }

    #[test]
    fn rotation_appends_shift_after_other_mixers() {
        let d = compile(MixMode::XorNeighbor, Preservation::Full, |p| p.rotation = 2);
        let rotate = d.find("action-rotate").unwrap();
        assert_eq!(
            d.input(rotate, Port::Sigil),
            Some(EdgeSource::Node(d.find("action-bit-xor").unwrap()))
        );
        assert_eq!(literal_at(&d, "action-rotate", Port::Amount), Some(Literal::Int(2)));
        let gate = d.find("gate").unwrap();
        assert_eq!(d.input(gate, Port::Above), Some(EdgeSource::Node(rotate)));
    }

    #[test]
    fn crossover_and_mutate_literals() {
        let d = compile(MixMode::SwapHalves, Preservation::Full, |_| {});
        assert_eq!(literal_at(&d, "action-crossover", Port::Point), Some(Literal::Int(4)));
        let d = compile(MixMode::Scramble, Preservation::Full, |p| p.update_probability = 0.25);
        assert_eq!(literal_at(&d, "action-mutate", Port::Rate), Some(Literal::Real(0.25)));
    }

    #[test]
    fn fallback_follows_preservation() {
        let full = compile(MixMode::Reverse, Preservation::Full, |_| {});
        let gate = full.find("gate").unwrap();
        assert_eq!(full.input(gate, Port::Below), Some(EdgeSource::Node(full.find("self").unwrap())));
        let none = compile(MixMode::Reverse, Preservation::None, |_| {});
        let gate = none.find("gate").unwrap();
        assert_eq!(none.input(gate, Port::Below), Some(EdgeSource::Node(none.find("prev").unwrap())));
        let partial = compile(MixMode::Reverse, Preservation::Partial, |_| {});
        assert_eq!(component_of(&partial, "fallback-avg"), Some(Component::SigilAverage));
        assert_eq!(literal_at(&partial, "gate", Port::Threshold), Some(Literal::Real(0.5)));
    }

    #[test]
    fn inversion_and_probability_stages() {
        let d = compile(MixMode::Majority, Preservation::Partial, |p| {
            p.invert_on_secondary = true;
            p.update_probability = 0.75;
        });
        let select = d.find("invert-select").unwrap();
        assert_eq!(
            d.input(select, Port::Cond),
            Some(EdgeSource::Node(d.find("exotype-bit0").unwrap()))
        );
        assert_eq!(
            d.input(select, Port::Then),
            Some(EdgeSource::Node(d.find("fallback-avg").unwrap()))
        );
        assert_eq!(d.input(select, Port::Else), Some(EdgeSource::Node(d.find("gate").unwrap())));
        let update = d.find("update-gate").unwrap();
        assert_eq!(d.input(update, Port::Above), Some(EdgeSource::Node(select)));
        assert_eq!(d.input(update, Port::Below), Some(EdgeSource::Node(d.find("self").unwrap())));
        assert_eq!(literal_at(&d, "update-gate", Port::Threshold), Some(Literal::Real(0.25)));
        assert_eq!(d.input(d.output(), Port::Sigil), Some(EdgeSource::Node(update)));
    }

    #[test]
    fn identity_pattern_reduces_to_self() {
        for tag in [Preservation::Full, Preservation::Partial, Preservation::None] {
            for invert in [false, true] {
                let d = compile(MixMode::None, tag, |p| p.invert_on_secondary = invert);
                for n in 0..8 {
                    let at = Neighborhood::from_index(n);
                    assert_eq!(evaluate_concrete(&d, at, EvalMode::Lifted).unwrap(), at.center);
                }
                let r = Analyzer::new(EvalMode::Lifted).analyze(&d).unwrap();
                assert_eq!(r.wolfram_rule, 204);
                assert!(r.verified());
            }
        }
    }

    #[test]
    fn distinct_branches_are_undetermined() {
        let d = compile(MixMode::Reverse, Preservation::Full, |_| {});
        assert_eq!(
            Analyzer::new(EvalMode::Lifted).analyze(&d).unwrap_err(),
            EvalError::UndeterminedGate { node: "gate".into() }
        );
        let d = compile(MixMode::None, Preservation::Full, |p| p.rotation = 1);
        assert!(matches!(
            Analyzer::new(EvalMode::Lifted).analyze(&d),
            Err(EvalError::NotLiftable { .. })
        ));
    }

    #[test]
    fn metadata_and_interpretation() {
        let pattern = Pattern::new("software/adapter")
            .with_clause(Clause::Condition, "interfaces disagree")
            .with_clause(Clause::Justification, "callers stay unchanged");
        let params = ParameterRecord {
            mix_mode: MixMode::XorNeighbor,
            ..ParameterRecord::default()
        };
        let r = Resolution {
            params,
            provenance: Provenance::Table,
            code: Some(crate::params::ExoCode(0b0110_1010)),
        };
        let d = WiringCompiler::default().compile(&pattern, &r).unwrap();
        assert_eq!(d.id(), "software/adapter");
        assert_eq!(d.meta().provenance, Provenance::Table);
        assert_eq!(d.meta().params.mix_mode, MixMode::XorNeighbor);
        assert!(d
            .interpretation()
            .contains("condition: similarity(self, prev) >= 0.50 -- IF interfaces disagree"));
        assert!(d.interpretation().contains("action: bit-xor(pred, succ)"));
        assert!(d.interpretation().ends_with("because: callers stay unchanged"));

        let back = WiringDiagram::from_json(&d.to_json().unwrap()).unwrap();
        assert_eq!(back.fingerprint(), d.fingerprint());
    }

    fn params_strategy() -> impl Strategy<Value = (ParameterRecord, Preservation)> {
        (
            0u32..4,
            0.0f64..=1.0,
            0.0f64..=1.0,
            prop::sample::select(MixMode::ALL.to_vec()),
            any::<bool>(),
            prop::sample::select(vec![Preservation::Full, Preservation::Partial, Preservation::None]),
        )
            .prop_map(|(rotation, match_threshold, update_probability, mix_mode, invert_on_secondary, tag)| {
                (
                    ParameterRecord {
                        rotation,
                        match_threshold,
                        update_probability,
                        mix_mode,
                        invert_on_secondary,
                    },
                    tag,
                )
            })
    }

    proptest! {
        #[test]
        fn compilation_is_idempotent((params, tag) in params_strategy()) {
            let pattern = Pattern::new("prop/pattern").with_preservation(tag);
            let compiler = WiringCompiler::default();
            let a = compiler.compile(&pattern, &resolution(params)).unwrap();
            let b = compiler.compile(&pattern, &resolution(params)).unwrap();
            prop_assert_eq!(a.fingerprint(), b.fingerprint());
            for n in 0..8 {
                let at = Neighborhood::from_index(n);
                prop_assert_eq!(
                    evaluate_concrete(&a, at, EvalMode::Lifted),
                    evaluate_concrete(&b, at, EvalMode::Lifted)
                );
            }
        }
    }
}
