mod fixture;

use std::time::Duration;

use fixture::{ScriptedSource, Step};
use tether::{MemorySink, SinkConfig, SinkError};

fn config() -> SinkConfig {
    SinkConfig::default()
        .with_min_buffer_size(4096)
        .with_reconnect_delay(Duration::from_millis(10))
}

#[test]
fn to_end_confirms_frontier_then_advances() {
    let source = ScriptedSource::spawn(vec![vec![
        Step::ExpectResume(-2),
        Step::SyncAck(4),
        Step::Data { index: 5, payload: b"hello".to_vec() },
    ]]);
    let sink = MemorySink::new(source.addr(), config());
    let mut tailer = sink.create_tailer().unwrap();

    assert!(tailer.to_end().unwrap());
    assert_eq!(tailer.index(), 5);
    assert_eq!(tailer.payload(), b"hello");
    tailer.finish();
    assert!(tailer.payload().is_empty());

    // nothing but heartbeats left
    assert!(!tailer.next_index().unwrap());

    tailer.close();
    sink.close();
    source.join();
}

#[test]
fn to_start_replays_from_the_beginning() {
    let source = ScriptedSource::spawn(vec![vec![
        Step::ExpectResume(-1),
        Step::SyncAck(-1),
        Step::Data { index: 0, payload: b"first".to_vec() },
    ]]);
    let sink = MemorySink::new(source.addr(), config());
    let mut tailer = sink.create_tailer().unwrap();

    assert!(tailer.to_start().unwrap());
    assert_eq!(tailer.index(), -1);
    assert!(tailer.next_index().unwrap());
    assert_eq!(tailer.index(), 0);
    assert_eq!(tailer.payload(), b"first");
    tailer.finish();

    tailer.close();
    sink.close();
    source.join();
}

#[test]
fn seek_positions_after_the_confirmed_index() {
    let source = ScriptedSource::spawn(vec![vec![
        Step::ExpectResume(2),
        Step::SyncAck(2),
        Step::Data { index: 3, payload: b"d".to_vec() },
    ]]);
    let sink = MemorySink::new(source.addr(), config());
    let mut excerpt = sink.create_excerpt().unwrap();

    assert!(excerpt.seek(2).unwrap());
    assert_eq!(excerpt.index(), 3);
    assert_eq!(excerpt.payload(), b"d");
    excerpt.finish();

    excerpt.close();
    sink.close();
    source.join();
}

#[test]
fn seek_fails_on_mismatched_ack() {
    let source = ScriptedSource::spawn(vec![vec![Step::ExpectResume(7), Step::SyncAck(5)]]);
    let sink = MemorySink::new(source.addr(), config());
    let mut excerpt = sink.create_excerpt().unwrap();

    assert!(!excerpt.seek(7).unwrap());

    excerpt.close();
    sink.close();
    source.join();
}

#[test]
fn heartbeat_aborts_positioning() {
    let source = ScriptedSource::spawn(vec![vec![Step::ExpectResume(-2), Step::Heartbeat]]);
    let sink = MemorySink::new(source.addr(), config());
    let mut tailer = sink.create_tailer().unwrap();

    assert!(!tailer.to_end().unwrap());

    tailer.close();
    sink.close();
    source.join();
}

#[test]
fn stale_records_before_the_ack_are_skipped() {
    let source = ScriptedSource::spawn(vec![vec![
        Step::ExpectResume(0),
        Step::Data { index: 0, payload: b"a".to_vec() },
        Step::SyncAck(0),
        Step::Data { index: 1, payload: b"b".to_vec() },
    ]]);
    let sink = MemorySink::new(source.addr(), config());
    let mut excerpt = sink.create_excerpt().unwrap();

    assert!(excerpt.seek(0).unwrap());
    assert_eq!(excerpt.index(), 1);
    assert_eq!(excerpt.payload(), b"b");
    excerpt.finish();

    excerpt.close();
    sink.close();
    source.join();
}

#[test]
fn reconnects_and_resumes_from_current_index() {
    let source = ScriptedSource::spawn(vec![
        vec![
            Step::ExpectResume(-1),
            Step::SyncAck(-1),
            Step::Data { index: 0, payload: b"a".to_vec() },
            Step::PartialData { index: 1, payload: b"bb".to_vec(), keep: 1 },
        ],
        vec![
            Step::ExpectResume(0),
            Step::SyncAck(0),
            Step::Data { index: 1, payload: b"bb".to_vec() },
        ],
    ]);
    let sink = MemorySink::new(source.addr(), config());
    let mut tailer = sink.create_tailer().unwrap();

    assert!(tailer.to_start().unwrap());
    assert!(tailer.next_index().unwrap());
    assert_eq!(tailer.payload(), b"a");
    tailer.finish();

    // the partial record dies with the connection
    assert!(!tailer.next_index().unwrap());
    // the retry reconnects and resumes after index 0
    assert!(tailer.next_index().unwrap());
    assert_eq!(tailer.index(), 1);
    assert_eq!(tailer.payload(), b"bb");
    tailer.finish();

    tailer.close();
    sink.close();
    source.join();
}

#[test]
fn corrupt_size_escapes_as_error() {
    let source = ScriptedSource::spawn(vec![vec![
        Step::ExpectResume(-2),
        Step::SyncAck(3),
        Step::RawHeader { size: 200_000_000, index: 4 },
    ]]);
    let sink = MemorySink::new(source.addr(), config());
    let mut tailer = sink.create_tailer().unwrap();

    assert!(matches!(tailer.to_end(), Err(SinkError::PayloadSize(200_000_000))));

    tailer.close();
    sink.close();
    source.join();
}

#[test]
fn memory_sink_surface() {
    let source = ScriptedSource::spawn(vec![]);
    let sink = MemorySink::new(source.addr(), config());

    assert_eq!(sink.size(), 0);
    assert_eq!(sink.last_written_index(), -1);
    sink.clear();
    assert!(matches!(sink.create_appender(), Err(SinkError::AppendUnsupported)));

    // memory handles are independent sessions; several may coexist
    let first = sink.create_tailer().unwrap();
    let second = sink.create_tailer().unwrap();
    drop(first);
    drop(second);
    sink.close();
}
