use std::time::Duration;

use grid_player::PlayerError;
use grid_player::decoder::{FrameSequence, LazyFrames, decode, diff, encode};
use grid_player::types::FrameData;

fn raw(frame: &[grid_player::types::ColorIndex]) -> Vec<u8> {
    frame.iter().map(|c| c.get()).collect()
}

#[test]
fn json_payload_decodes_in_canonical_order() {
    let data = FrameData::from_json(r#"{"fps": 10, "frames": [[[0, 2], [1, 2]], [[3, 4]]]}"#)
        .unwrap();
    let frames = decode(&data.frames, 4).unwrap();
    assert_eq!(raw(&frames[0]), vec![0, 0, 1, 1]);
    assert_eq!(raw(&frames[1]), vec![3, 3, 3, 3]);
}

#[test]
fn one_bad_frame_fails_the_whole_dataset() {
    let data = FrameData::from_json(r#"{"fps": 10, "frames": [[[0, 4]], [[0, 2], [1, 1]], [[2, 4]]]}"#)
        .unwrap();
    match FrameSequence::decode(&data, 4) {
        Err(PlayerError::MalformedFrame {
            frame,
            expected,
            actual,
        }) => {
            assert_eq!((frame, expected, actual), (1, 4, 3));
        }
        other => panic!("expected a malformed frame, got {other:?}"),
    }
}

#[test]
fn reencoding_a_decoded_frame_gives_back_maximal_runs() {
    let data =
        FrameData::from_json(r#"{"fps": 30, "frames": [[[4, 3], [0, 1], [2, 2], [4, 6]]]}"#).unwrap();
    let frames = decode(&data.frames, 12).unwrap();
    assert_eq!(encode(&frames[0]), data.frames[0]);
}

#[test]
fn frame_due_at_250ms_at_10fps_is_the_third() {
    let data = FrameData::from_json(r#"{"fps": 10, "frames": [[[0, 1]], [[1, 1]], [[2, 1]], [[3, 1]]]}"#)
        .unwrap();
    let seq = FrameSequence::decode(&data, 1).unwrap();
    assert_eq!(seq.index_at(Duration::from_millis(250)), 2);
    assert_eq!(raw(seq.frame(seq.index_at(Duration::from_millis(250)))), vec![2]);
    assert_eq!(seq.index_at(Duration::from_secs(10)), 3);
}

#[test]
fn lazy_frames_report_nominal_duration_before_decoding() {
    // Malformed on purpose: the duration comes from the header alone.
    let data = FrameData::from_json(r#"{"fps": 4, "frames": [[[0, 1]], [[0, 1]]]}"#).unwrap();
    let lazy = LazyFrames::new(data, 3);
    assert_eq!(lazy.nominal_duration(), Duration::from_millis(500));
    assert!(lazy.get().is_err());
}

#[test]
fn compiled_diff_dataset_plays_like_the_original() {
    // 3 columns x 2 rows.
    let diffs = diff::DiffData::from_json(
        r#"{"fps": 20, "frames": [[[0, 0, 1], [2, 1, 3]], [], [[0, 0, 0], [1, 1, 4]]]}"#,
    )
    .unwrap();
    let data = diff::to_run_length(&diffs, 3, 2).unwrap();
    assert_eq!(data.fps, 20.0);

    let json = serde_json::to_string(&data).unwrap();
    let seq = FrameSequence::decode(&FrameData::from_json(&json).unwrap(), 6).unwrap();
    assert_eq!(seq.len(), 3);
    assert_eq!(raw(seq.frame(0)), vec![1, 0, 0, 0, 0, 3]);
    assert_eq!(raw(seq.frame(1)), vec![1, 0, 0, 0, 0, 3]);
    assert_eq!(raw(seq.frame(2)), vec![0, 0, 0, 4, 0, 3]);
    assert_eq!(seq.changed_cells(1), 0);
    assert_eq!(seq.changed_cells(2), 2);
}
