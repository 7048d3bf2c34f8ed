use spdif_loopback::ring_buffer::SampleRing;

#[test]
fn test_starts_prefilled_at_target() {
    let mut ring = SampleRing::new(2048, 128);

    assert_eq!(ring.fill(), 128);
    assert_eq!(ring.free(), 2047 - 128);

    let mut out = [1.0f32; 128];
    ring.pop_into(&mut out);
    assert!(out.iter().all(|&s| s == 0.0));
    assert_eq!(ring.fill(), 0);
}

#[test]
fn test_fill_and_free_account_for_vacant_slot() {
    let mut ring = SampleRing::new(8, 0);

    assert_eq!(ring.fill(), 0);
    assert_eq!(ring.free(), 7);

    ring.push(&[1.0, 2.0, 3.0]);
    assert_eq!(ring.fill(), 3);
    assert_eq!(ring.free(), 4);

    ring.push(&[4.0, 5.0, 6.0, 7.0]);
    assert_eq!(ring.fill(), 7);
    assert_eq!(ring.free(), 0);
}

#[test]
fn test_fifo_order_across_wraparound() {
    let mut ring = SampleRing::new(8, 0);
    let mut next_in = 0.0f32;
    let mut next_out = 0.0f32;

    // Push/pop far more than the capacity so the indices wrap many times.
    for _ in 0..100 {
        let batch: Vec<f32> = (0..5).map(|i| next_in + i as f32).collect();
        next_in += 5.0;
        ring.push(&batch);

        let mut out = [0.0f32; 5];
        ring.pop_into(&mut out);
        for &sample in &out {
            assert_eq!(sample, next_out);
            next_out += 1.0;
        }
    }

    assert_eq!(ring.fill(), 0);
}

#[test]
fn test_partial_pop_advances_read_side_only() {
    let mut ring = SampleRing::new(16, 0);
    ring.push(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

    let mut out = [0.0f32; 2];
    ring.pop_into(&mut out);
    assert_eq!(out, [1.0, 2.0]);
    assert_eq!(ring.fill(), 4);

    ring.pop_into(&mut out);
    assert_eq!(out, [3.0, 4.0]);

    ring.push(&[7.0]);
    let mut rest = [0.0f32; 3];
    ring.pop_into(&mut rest);
    assert_eq!(rest, [5.0, 6.0, 7.0]);
}

#[test]
fn test_push_sample_matches_slice_push() {
    let mut a = SampleRing::new(8, 0);
    let mut b = SampleRing::new(8, 0);

    a.push(&[0.25, -0.5]);
    b.push_sample(0.25);
    b.push_sample(-0.5);

    let mut out_a = [0.0f32; 2];
    let mut out_b = [0.0f32; 2];
    a.pop_into(&mut out_a);
    b.pop_into(&mut out_b);
    assert_eq!(out_a, out_b);
}
