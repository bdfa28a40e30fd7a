//! End-to-end tests against the built-in block runtime. No audio hardware
//! is required; device sources are fed through ring buffers and `sink-auto`
//! resolves to a collecting sink.

use std::time::Duration;

use verzug::{
    BlockRuntime, BusEvent, Component, Error, Interrupt, LinkError, NodeSpec, PipelineState,
    PlaybackController, Regime, Runtime, TerminationReason, Verzug,
};

const RATE: u32 = 48_000;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// A duration of exactly `samples` samples at the test rate.
fn samples(samples: u64) -> Duration {
    Duration::from_secs_f64(samples as f64 / RATE as f64)
}

/// Feed `count` copies of `value` into a device ring and end the stream.
fn feed_constant(producer: &mut rtrb::Producer<f32>, value: f32, count: usize) {
    for _ in 0..count {
        producer.push(value).unwrap();
    }
}

fn collected_name(runtime: &BlockRuntime) -> String {
    runtime
        .element_names()
        .into_iter()
        .find(|name| name.starts_with("sink-auto"))
        .expect("no auto sink in graph")
        .to_string()
}

#[test]
/// A chain of n components establishes n-1 internal links and forwards the
/// end ports: no virtual input when the head is a source, a virtual output
/// from the tail.
fn chain_links_internals_and_forwards_end_ports() {
    let mut graph = Verzug::new(BlockRuntime::new());
    let tone = graph.add(NodeSpec::test_tone(440.0)).unwrap();
    let q1 = graph.add(NodeSpec::delay_queue(Duration::ZERO)).unwrap();
    let q2 = graph.add(NodeSpec::delay_queue(Duration::ZERO)).unwrap();

    let composite = graph.chain::<Vec<Component>>(vec![tone.into(), q1.into(), q2.into()]).unwrap();

    assert!(composite.virtual_input().is_none());
    assert!(composite.virtual_output().is_some());
    assert_eq!(composite.len(), 3);
    assert_eq!(graph.runtime().link_count(), 2);
}

#[test]
/// The single-component chain is the degenerate case: both ports pass
/// through untouched and nothing is linked.
fn single_node_chain_passes_ports_through() {
    let mut graph = Verzug::new(BlockRuntime::new());
    let queue = graph.add(NodeSpec::delay_queue(Duration::ZERO)).unwrap();

    let composite = graph.chain([queue]).unwrap();

    assert!(composite.virtual_input().is_some());
    assert!(composite.virtual_output().is_some());
    assert_eq!(graph.runtime().link_count(), 0);

    let mut graph = Verzug::new(BlockRuntime::new());
    let sink = graph.add(NodeSpec::auto_sink()).unwrap();
    let composite = graph.chain([sink]).unwrap();
    assert!(composite.virtual_input().is_some());
    assert!(composite.virtual_output().is_none());
}

#[test]
/// Mixing k components allocates exactly k input ports on the mixer and one
/// output on the composite.
fn mix_allocates_one_port_per_component() {
    let mut graph = Verzug::new(BlockRuntime::new());
    let mut branches: Vec<Component> = Vec::new();
    for _ in 0..3 {
        branches.push(graph.add(NodeSpec::test_tone(440.0)).unwrap().into());
    }

    let composite = graph.mix(branches).unwrap();

    assert!(composite.virtual_input().is_none());
    assert!(composite.virtual_output().is_some());

    let mixer_name = graph
        .runtime()
        .element_names()
        .into_iter()
        .find(|name| name.starts_with("mixer"))
        .unwrap()
        .to_string();
    assert_eq!(graph.runtime().input_port_count(&mixer_name), Some(3));
    assert_eq!(graph.runtime().link_count(), 3);
}

#[test]
/// The mixer's port allocation is capacity-bounded.
fn mix_rejects_too_many_inputs() {
    let mut graph = Verzug::new(BlockRuntime::new());
    let mut branches: Vec<Component> = Vec::new();
    for _ in 0..17 {
        branches.push(graph.add(NodeSpec::test_tone(440.0)).unwrap().into());
    }

    match graph.mix(branches) {
        Err(Error::TooManyInputs { .. }) => {}
        other => panic!("expected TooManyInputs, got {other:?}"),
    }
}

#[test]
/// A zero-duration delay queue is a pass-through: Flowing immediately, data
/// arrives at the sink from the first block.
fn zero_delay_is_passthrough() {
    init_tracing();
    let mut runtime = BlockRuntime::with_sample_rate(RATE);
    let mut feed = runtime.register_device("mic", 4096);
    feed_constant(&mut feed, 0.5, 256);
    drop(feed);

    let mut graph = Verzug::new(runtime);
    let mic = graph.add(NodeSpec::device_source("mic")).unwrap();
    let queue = graph.add(NodeSpec::delay_queue(Duration::ZERO)).unwrap();
    let sink = graph.add(NodeSpec::auto_sink()).unwrap();
    let root = graph.chain([mic, queue, sink]).unwrap();
    let mut pipeline = graph.assemble(root).unwrap();

    pipeline.play().unwrap();
    let queue_name = pipeline
        .runtime()
        .element_names()
        .into_iter()
        .find(|name| name.starts_with("delay-queue"))
        .unwrap()
        .to_string();
    assert_eq!(
        pipeline.runtime().queue_regime(&queue_name),
        Some(Regime::Flowing)
    );

    pipeline.runtime_mut().step(1);
    let sink_name = collected_name(pipeline.runtime());
    let samples = pipeline.runtime().collected(&sink_name).unwrap();
    assert_eq!(&samples[..64], &[0.5f32; 64]);
}

#[test]
/// A positive threshold keeps the queue in the Filling regime (emitting
/// nothing) until the configured duration has buffered, then it flows for
/// good.
fn delay_queue_fills_then_flows() {
    let mut runtime = BlockRuntime::with_sample_rate(RATE);
    let mut feed = runtime.register_device("mic", 4096);
    feed_constant(&mut feed, 1.0, 512);

    let mut graph = Verzug::new(runtime);
    let mic = graph.add(NodeSpec::device_source("mic")).unwrap();
    let queue = graph
        .add_named(NodeSpec::delay_queue(samples(128)), "offset")
        .unwrap();
    let sink = graph.add(NodeSpec::auto_sink()).unwrap();
    let root = graph.chain([mic, queue, sink]).unwrap();
    let mut pipeline = graph.assemble(root).unwrap();
    pipeline.play().unwrap();

    pipeline.runtime_mut().step(1);
    assert_eq!(
        pipeline.runtime().queue_regime("offset"),
        Some(Regime::Filling)
    );

    pipeline.runtime_mut().step(1);
    assert_eq!(
        pipeline.runtime().queue_regime("offset"),
        Some(Regime::Flowing)
    );

    // Nothing came out while filling.
    let sink_name = collected_name(pipeline.runtime());
    let collected = pipeline.runtime().collected(&sink_name).unwrap();
    assert!(collected[..128].iter().all(|&s| s == 0.0));

    // Flowing is sticky.
    pipeline.runtime_mut().step(16);
    assert_eq!(
        pipeline.runtime().queue_regime("offset"),
        Some(Regime::Flowing)
    );
}

#[test]
/// Two branches merged at a mixer - one through a delay queue, one direct -
/// arrive with a relative offset of exactly the configured duration, and
/// the mixer genuinely sums them.
fn delayed_branch_is_offset_and_summed() {
    init_tracing();
    let delay = 128u64;
    let fed = 480usize;

    let mut runtime = BlockRuntime::with_sample_rate(RATE);
    let mut feed_a = runtime.register_device("direct", 4096);
    let mut feed_b = runtime.register_device("delayed", 4096);
    feed_constant(&mut feed_a, 1.0, fed);
    feed_constant(&mut feed_b, 1.0, fed);
    drop(feed_a);
    drop(feed_b);

    let mut graph = Verzug::new(runtime);
    let direct = graph.add(NodeSpec::device_source("direct")).unwrap();
    let delayed_src = graph.add(NodeSpec::device_source("delayed")).unwrap();
    let queue = graph.add(NodeSpec::delay_queue(samples(delay))).unwrap();
    let delayed = graph.chain([delayed_src, queue]).unwrap();

    let mixed = graph.mix::<Vec<Component>>(vec![direct.into(), delayed.into()]).unwrap();
    let sink = graph.add(NodeSpec::auto_sink()).unwrap();
    let root = graph.chain::<Vec<Component>>(vec![mixed.into(), sink.into()]).unwrap();
    let mut pipeline = graph.assemble(root).unwrap();

    let reason = PlaybackController::new().run(&mut pipeline).unwrap();
    assert_eq!(reason, TerminationReason::EndOfStream);

    let sink_name = collected_name(pipeline.runtime());
    let out = pipeline.runtime().collected(&sink_name).unwrap();
    let delay = delay as usize;

    // Direct branch only, then both, then the delayed tail on its own.
    assert!(out[..delay].iter().all(|&s| (s - 1.0).abs() < 1e-6));
    assert!(out[delay..fed].iter().all(|&s| (s - 2.0).abs() < 1e-6));
    assert!(out[fed..fed + delay].iter().all(|&s| (s - 1.0).abs() < 1e-6));
    assert!(out[fed + delay..].iter().all(|&s| s == 0.0));
}

#[test]
/// A dangling non-source input fails assembly; no pipeline comes back.
fn assemble_rejects_dangling_input() {
    let mut graph = Verzug::new(BlockRuntime::new());
    let queue = graph.add(NodeSpec::delay_queue(Duration::ZERO)).unwrap();
    let sink = graph.add(NodeSpec::auto_sink()).unwrap();
    let root = graph.chain([queue, sink]).unwrap();

    match graph.assemble(root) {
        Err(Error::IncompleteGraph { reason }) => {
            assert!(reason.contains("unlinked input"), "reason: {reason}")
        }
        other => panic!("expected IncompleteGraph, got {:?}", other.map(|_| ())),
    }
}

#[test]
/// A mixer whose ghosted input was never fed is an incomplete graph too.
fn assemble_rejects_unfed_mixer_head() {
    let mut graph = Verzug::new(BlockRuntime::new());
    let mixer = graph.add(NodeSpec::mixer()).unwrap();
    let sink = graph.add(NodeSpec::auto_sink()).unwrap();
    let root = graph.chain([mixer, sink]).unwrap();

    assert!(matches!(
        graph.assemble(root),
        Err(Error::IncompleteGraph { .. })
    ));
}

#[test]
/// Immediate end-of-stream: the run reports it and leaves the pipeline
/// Stopped.
fn run_returns_end_of_stream_and_stops() {
    let mut graph = Verzug::new(BlockRuntime::new());
    let tone = graph
        .add(NodeSpec::test_tone_for(440.0, Duration::ZERO))
        .unwrap();
    let sink = graph.add(NodeSpec::auto_sink()).unwrap();
    let root = graph.chain([tone, sink]).unwrap();
    let mut pipeline = graph.assemble(root).unwrap();

    let reason = PlaybackController::new().run(&mut pipeline).unwrap();
    assert_eq!(reason, TerminationReason::EndOfStream);
    assert_eq!(pipeline.state(), PipelineState::Stopped);
}

#[test]
/// A bus error becomes the termination reason, after the unconditional stop.
fn run_surfaces_runtime_error() {
    let mut graph = Verzug::new(BlockRuntime::new());
    let tone = graph.add(NodeSpec::test_tone(440.0)).unwrap();
    let sink = graph.add(NodeSpec::auto_sink()).unwrap();
    let root = graph.chain([tone, sink]).unwrap();
    let mut pipeline = graph.assemble(root).unwrap();

    pipeline
        .runtime_mut()
        .inject_event(BusEvent::Error("decoder blew up".to_string()));

    let reason = PlaybackController::new().run(&mut pipeline).unwrap();
    assert_eq!(
        reason,
        TerminationReason::Error("decoder blew up".to_string())
    );
    assert_eq!(pipeline.state(), PipelineState::Stopped);
}

#[test]
/// Warnings and state-change events on the bus do not end the run.
fn run_ignores_informational_events() {
    let mut graph = Verzug::new(BlockRuntime::new());
    let tone = graph
        .add(NodeSpec::test_tone_for(440.0, Duration::from_millis(5)))
        .unwrap();
    let sink = graph.add(NodeSpec::auto_sink()).unwrap();
    let root = graph.chain([tone, sink]).unwrap();
    let mut pipeline = graph.assemble(root).unwrap();

    pipeline
        .runtime_mut()
        .inject_event(BusEvent::Warning("speed wobble".to_string()));

    let reason = PlaybackController::new().run(&mut pipeline).unwrap();
    assert_eq!(reason, TerminationReason::EndOfStream);
}

#[test]
/// An interrupt observed at the start of the loop ends the run without
/// touching the bus.
fn run_honors_pretriggered_interrupt() {
    let mut graph = Verzug::new(BlockRuntime::new());
    let tone = graph.add(NodeSpec::test_tone(440.0)).unwrap();
    let sink = graph.add(NodeSpec::auto_sink()).unwrap();
    let root = graph.chain([tone, sink]).unwrap();
    let mut pipeline = graph.assemble(root).unwrap();

    let controller = PlaybackController::new();
    controller.interrupt().trigger();

    let reason = controller.run(&mut pipeline).unwrap();
    assert_eq!(reason, TerminationReason::Interrupted);
    assert_eq!(pipeline.state(), PipelineState::Stopped);
}

#[test]
/// An interrupt arriving mid-run is noticed within a poll interval; the
/// unbounded source would otherwise play forever.
fn run_interrupted_from_another_thread() {
    let mut graph = Verzug::new(BlockRuntime::new());
    let tone = graph.add(NodeSpec::test_tone(440.0)).unwrap();
    let sink = graph.add(NodeSpec::auto_sink()).unwrap();
    let root = graph.chain([tone, sink]).unwrap();
    let mut pipeline = graph.assemble(root).unwrap();

    let interrupt = Interrupt::new();
    let controller = PlaybackController::new()
        .with_poll_timeout(Duration::from_millis(50))
        .with_interrupt(interrupt.clone());

    let trigger = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        interrupt.trigger();
    });

    let reason = controller.run(&mut pipeline).unwrap();
    trigger.join().unwrap();

    assert_eq!(reason, TerminationReason::Interrupted);
    assert_eq!(pipeline.state(), PipelineState::Stopped);
}

#[test]
/// The original two-branch scenario: a direct 440 Hz chain and a 200 ms
/// delayed one, mixed into a sink; assembly succeeds and an immediate
/// end-of-stream run reports EndOfStream.
fn two_branch_scenario_assembles_and_finishes() {
    init_tracing();
    let mut graph = Verzug::new(BlockRuntime::new());

    let tone_a = graph
        .add(NodeSpec::test_tone_for(440.0, Duration::ZERO))
        .unwrap();
    let queue_a = graph.add(NodeSpec::delay_queue(Duration::ZERO)).unwrap();
    let branch_a = graph.chain([tone_a, queue_a]).unwrap();

    let tone_b = graph
        .add(NodeSpec::test_tone_for(440.0, Duration::ZERO))
        .unwrap();
    let queue_b = graph
        .add(NodeSpec::delay_queue(Duration::from_millis(200)))
        .unwrap();
    let branch_b = graph.chain([tone_b, queue_b]).unwrap();

    let mixed = graph.mix([branch_a, branch_b]).unwrap();
    let sink = graph.add(NodeSpec::auto_sink()).unwrap();
    let root = graph.chain::<Vec<Component>>(vec![mixed.into(), sink.into()]).unwrap();
    let mut pipeline = graph.assemble(root).unwrap();

    let reason = PlaybackController::new().run(&mut pipeline).unwrap();
    assert_eq!(reason, TerminationReason::EndOfStream);
}

#[test]
/// Ports take at most one link each; the runtime refuses seconds.
fn runtime_rejects_double_links() {
    let mut runtime = BlockRuntime::new();
    let tone_a = runtime
        .create_element(verzug::NodeKind::SourceTest, "a")
        .unwrap();
    let tone_b = runtime
        .create_element(verzug::NodeKind::SourceTest, "b")
        .unwrap();
    let queue = runtime
        .create_element(verzug::NodeKind::DelayQueue, "q")
        .unwrap();

    let a_out = runtime.output_port(tone_a).unwrap();
    let b_out = runtime.output_port(tone_b).unwrap();
    let q_in = runtime.input_port(queue).unwrap();

    runtime.link(a_out, q_in).unwrap();
    assert!(matches!(
        runtime.link(b_out, q_in),
        Err(LinkError::InputTaken)
    ));
    assert!(matches!(
        runtime.link(a_out, q_in),
        Err(LinkError::OutputTaken)
    ));
}

#[test]
/// Value validation happens at node creation.
fn invalid_configurations_are_rejected() {
    let mut graph = Verzug::new(BlockRuntime::new());

    assert!(matches!(
        graph.add(NodeSpec::test_tone(-5.0)),
        Err(Error::Configuration { .. })
    ));
    assert!(matches!(
        graph.add(NodeSpec::device_source("")),
        Err(Error::Configuration { .. })
    ));
    assert!(matches!(
        graph.add(NodeSpec::file_sink("")),
        Err(Error::Configuration { .. })
    ));
    assert!(matches!(
        graph.chain(Vec::<Component>::new()),
        Err(Error::Configuration { .. })
    ));
    assert!(matches!(
        graph.mix(Vec::<Component>::new()),
        Err(Error::Configuration { .. })
    ));
}

#[test]
/// Binding an unregistered capture device fails at the factory.
fn unknown_device_is_unavailable() {
    let mut graph = Verzug::new(BlockRuntime::new());
    match graph.add(NodeSpec::device_source("not-a-device")) {
        Err(Error::DeviceUnavailable { name }) => assert_eq!(name, "not-a-device"),
        other => panic!("expected DeviceUnavailable, got {other:?}"),
    }
}

#[test]
/// A complete chain ending in a sink exposes no output and cannot feed a
/// mixer.
fn sealed_chain_cannot_feed_mixer() {
    let mut graph = Verzug::new(BlockRuntime::new());
    let tone = graph.add(NodeSpec::test_tone(440.0)).unwrap();
    let sink = graph.add(NodeSpec::auto_sink()).unwrap();
    let sealed = graph.chain([tone, sink]).unwrap();

    assert!(matches!(
        graph.mix([sealed]),
        Err(Error::IncompatiblePorts { .. })
    ));
}

#[test]
/// The file sink dumps raw samples; a short run produces a non-empty file
/// of whole little-endian f32s.
fn file_sink_writes_raw_samples() {
    let path = std::env::temp_dir().join(format!("verzug-filesink-{}.f32", std::process::id()));

    let mut graph = Verzug::new(BlockRuntime::with_sample_rate(RATE));
    let tone = graph
        .add(NodeSpec::test_tone_for(440.0, samples(256)))
        .unwrap();
    let sink = graph.add(NodeSpec::file_sink(&path)).unwrap();
    let root = graph.chain([tone, sink]).unwrap();
    let mut pipeline = graph.assemble(root).unwrap();

    let reason = PlaybackController::new().run(&mut pipeline).unwrap();
    assert_eq!(reason, TerminationReason::EndOfStream);
    drop(pipeline);

    let bytes = std::fs::read(&path).unwrap();
    std::fs::remove_file(&path).ok();
    assert!(bytes.len() >= 256 * 4);
    assert_eq!(bytes.len() % 4, 0);

    // 440 Hz at 48 kHz swings negative within the first 256 samples.
    let has_negative = bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .take(256)
        .any(|s| s < 0.0);
    assert!(has_negative);
}
