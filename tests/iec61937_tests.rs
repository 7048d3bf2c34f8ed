use spdif_loopback::iec61937::{Iec61937Fsm, DATA_TYPE_AC3};

/// Build the byte stream for one data burst as it appears in the s16le
/// capture stream: the 61937 words are big-endian on the wire.
fn burst_bytes(data_type: u16, length_field: u16, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    for _ in 0..4 {
        out.extend_from_slice(&[0x00, 0x00]);
    }
    out.extend_from_slice(&0xF872u16.to_be_bytes());
    out.extend_from_slice(&0x4E1Fu16.to_be_bytes());
    out.extend_from_slice(&data_type.to_be_bytes());
    out.extend_from_slice(&length_field.to_be_bytes());
    out.extend_from_slice(payload);
    if payload.len() % 2 == 1 {
        // Pad byte completing the final 16-bit sample.
        out.push(0x00);
    }
    out
}

fn run(fsm: &mut Iec61937Fsm, bytes: &[u8]) -> (bool, Vec<(u8, Vec<u8>)>) {
    let mut bursts = Vec::new();
    let locked = fsm.process_chunk(bytes, |burst| {
        bursts.push((burst.data_type, burst.payload.to_vec()));
    });
    (locked, bursts)
}

#[test]
fn test_single_burst_round_trip() {
    let payload: Vec<u8> = (0..16u8).collect();
    let stream = burst_bytes(0x0001, (payload.len() * 8) as u16, &payload);

    let mut fsm = Iec61937Fsm::new();
    let (locked, bursts) = run(&mut fsm, &stream);

    assert!(locked);
    assert_eq!(bursts.len(), 1);
    assert_eq!(bursts[0].0, DATA_TYPE_AC3);
    assert_eq!(bursts[0].1, payload);
}

#[test]
fn test_multiple_bursts_in_order() {
    let mut stream = Vec::new();
    for i in 0..3u8 {
        let payload = vec![i; 8];
        stream.extend_from_slice(&burst_bytes(0x0001, 64, &payload));
    }

    let mut fsm = Iec61937Fsm::new();
    let (_, bursts) = run(&mut fsm, &stream);

    assert_eq!(bursts.len(), 3);
    for (i, (data_type, payload)) in bursts.iter().enumerate() {
        assert_eq!(*data_type, DATA_TYPE_AC3);
        assert_eq!(*payload, vec![i as u8; 8]);
    }
}

#[test]
fn test_burst_split_across_chunks() {
    let payload: Vec<u8> = (0..32u8).collect();
    let stream = burst_bytes(0x0001, 256, &payload);
    let (first, second) = stream.split_at(stream.len() / 2);

    let mut fsm = Iec61937Fsm::new();
    let (locked_first, bursts_first) = run(&mut fsm, first);
    let (locked_second, bursts_second) = run(&mut fsm, second);

    assert!(locked_first);
    assert!(locked_second);
    assert!(bursts_first.is_empty());
    assert_eq!(bursts_second.len(), 1);
    assert_eq!(bursts_second[0].1, payload);
}

#[test]
fn test_odd_payload_length_discards_pad() {
    // 24 bits = 3 bytes; the low byte of the final sample is a pad.
    let stream = burst_bytes(0x0001, 24, &[0xAA, 0xBB, 0xCC]);

    let mut fsm = Iec61937Fsm::new();
    let (_, bursts) = run(&mut fsm, &stream);

    assert_eq!(bursts.len(), 1);
    assert_eq!(bursts[0].1, vec![0xAA, 0xBB, 0xCC]);
}

#[test]
fn test_extended_data_type_resets() {
    let mut stream = burst_bytes(0x001F, 64, &[0u8; 8]);
    // A valid burst right after must still be recognized.
    stream.extend_from_slice(&burst_bytes(0x0001, 16, &[0x12, 0x34]));

    let mut fsm = Iec61937Fsm::new();
    let (_, bursts) = run(&mut fsm, &stream);

    assert_eq!(bursts.len(), 1);
    assert_eq!(bursts[0].1, vec![0x12, 0x34]);
}

#[test]
fn test_non_ac3_data_type_discarded() {
    // Data type 0x0B (DTS) has a different length-field unit; the machine
    // bails rather than guess.
    let stream = burst_bytes(0x000B, 64, &[0u8; 8]);

    let mut fsm = Iec61937Fsm::new();
    let (_, bursts) = run(&mut fsm, &stream);

    assert!(bursts.is_empty());
}

#[test]
fn test_zero_length_burst_discarded() {
    let mut stream = burst_bytes(0x0001, 0, &[]);
    stream.extend_from_slice(&burst_bytes(0x0001, 16, &[0x55, 0x66]));

    let mut fsm = Iec61937Fsm::new();
    let (_, bursts) = run(&mut fsm, &stream);

    assert_eq!(bursts.len(), 1);
    assert_eq!(bursts[0].1, vec![0x55, 0x66]);
}

#[test]
fn test_long_zero_run_before_sync_tolerated() {
    let mut stream = Vec::new();
    // Far more than the minimum four zero samples.
    for _ in 0..64 {
        stream.extend_from_slice(&[0x00, 0x00]);
    }
    stream.extend_from_slice(&0xF872u16.to_be_bytes());
    stream.extend_from_slice(&0x4E1Fu16.to_be_bytes());
    stream.extend_from_slice(&0x0001u16.to_be_bytes());
    stream.extend_from_slice(&16u16.to_be_bytes());
    stream.extend_from_slice(&[0xDE, 0xAD]);

    let mut fsm = Iec61937Fsm::new();
    let (locked, bursts) = run(&mut fsm, &stream);

    assert!(locked);
    assert_eq!(bursts.len(), 1);
    assert_eq!(bursts[0].1, vec![0xDE, 0xAD]);
}

#[test]
fn test_silence_never_locks() {
    let zeros = vec![0u8; 512];

    let mut fsm = Iec61937Fsm::new();
    for _ in 0..64 {
        let (locked, bursts) = run(&mut fsm, &zeros);
        assert!(!locked);
        assert!(bursts.is_empty());
    }
}

#[test]
fn test_pcm_content_never_locks() {
    // Constant nonzero samples cannot even reach the zero-run states.
    let chunk: Vec<u8> = std::iter::repeat([0x11, 0x11]).take(256).flatten().collect();

    let mut fsm = Iec61937Fsm::new();
    let (locked, bursts) = run(&mut fsm, &chunk);

    assert!(!locked);
    assert!(bursts.is_empty());
}

#[test]
fn test_lock_reported_from_header_parse_onwards() {
    let mut fsm = Iec61937Fsm::new();

    // Preamble alone: the step consuming the second sync word commits the
    // machine to a header and must report lock.
    let mut header = Vec::new();
    for _ in 0..4 {
        header.extend_from_slice(&[0x00, 0x00]);
    }
    header.extend_from_slice(&0xF872u16.to_be_bytes());
    let (locked, _) = run(&mut fsm, &header);
    assert!(!locked);

    let (locked, _) = run(&mut fsm, &0x4E1Fu16.to_be_bytes());
    assert!(locked);
}

#[test]
fn test_max_length_field_bounds_payload() {
    // The largest AC-3 length field is 0xFFFF bits, 8191 whole bytes.
    let payload = vec![0x42u8; 8191];
    let stream = burst_bytes(0x0001, 0xFFFF, &payload);

    let mut fsm = Iec61937Fsm::new();
    let (_, bursts) = run(&mut fsm, &stream);

    assert_eq!(bursts.len(), 1);
    assert_eq!(bursts[0].1.len(), 8191);
    assert_eq!(bursts[0].1, payload);
}
