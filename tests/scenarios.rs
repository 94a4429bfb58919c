//! End-to-end evaluation scenarios and engine-wide properties.

use proptest::prelude::*;

use knotwork::{
    coalign, constant, cor, cov, data_node, evaluate, lag, mean, mean_window, sum, var,
    Alignment, Block, BinaryFunc, IdentityMap, Node, Timestamp, Value,
};

fn t(d: u32) -> Timestamp {
    Timestamp::from_ymd(2000, 1, d).unwrap()
}

fn floats(xs: &[(u32, f64)]) -> Node {
    data_node(xs.iter().map(|&(d, x)| (t(d), Value::float(x))).collect()).unwrap()
}

fn ints(xs: &[(u32, i64)]) -> Node {
    data_node(xs.iter().map(|&(d, x)| (t(d), Value::Int(x))).collect()).unwrap()
}

fn int_block(xs: &[(u32, i64)]) -> Block {
    Block::new(xs.iter().map(|&(d, x)| (t(d), Value::Int(x))).collect()).unwrap()
}

fn b1() -> Node {
    ints(&[(1, 1), (2, 2), (3, 3), (4, 4)])
}

fn b2() -> Node {
    ints(&[(2, 5), (3, 6), (5, 8)])
}

#[test]
fn s1_add_union() {
    IdentityMap::scoped(|| {
        let total = b1() + b2();
        let out = evaluate(&total, t(1), t(10)).unwrap();
        assert_eq!(
            out,
            int_block(&[(2, 7), (3, 9), (4, 10), (5, 12)])
        );
    });
}

#[test]
fn s2_add_intersect() {
    IdentityMap::scoped(|| {
        let total = knotwork::binary(&b1(), &b2(), BinaryFunc::Add, Alignment::Intersect).unwrap();
        let out = evaluate(&total, t(1), t(10)).unwrap();
        assert_eq!(out, int_block(&[(2, 7), (3, 9)]));
    });
}

#[test]
fn s3_add_left() {
    IdentityMap::scoped(|| {
        let total = knotwork::binary(&b1(), &b2(), BinaryFunc::Add, Alignment::Left).unwrap();
        let out = evaluate(&total, t(1), t(10)).unwrap();
        assert_eq!(out, int_block(&[(2, 7), (3, 9), (4, 10)]));
    });
}

#[test]
fn s4_constant_evaluation() {
    IdentityMap::scoped(|| {
        let c = constant(Value::Int(3)).unwrap();
        let start = Timestamp::from_ymd(2020, 1, 1).unwrap();
        let end = Timestamp::from_ymd(2020, 1, 2).unwrap();
        let out = evaluate(&c, start, end).unwrap();
        assert_eq!(out, Block::new(vec![(start, Value::Int(3))]).unwrap());
    });
}

#[test]
fn s5_lag_on_constant() {
    IdentityMap::scoped(|| {
        let c = constant(Value::Int(1)).unwrap();
        assert_eq!(lag(&c, 2).unwrap(), c);
    });
}

#[test]
fn s6_running_mean_and_var() {
    IdentityMap::scoped(|| {
        let x = floats(&[(1, 2.0), (2, 4.0), (3, 6.0)]);

        let m = evaluate(&mean(&x).unwrap(), t(1), t(10)).unwrap();
        assert_eq!(
            m,
            Block::new(vec![
                (t(1), Value::float(2.0)),
                (t(2), Value::float(3.0)),
                (t(3), Value::float(4.0)),
            ])
            .unwrap()
        );

        let v = evaluate(&var(&x, true).unwrap(), t(1), t(10)).unwrap();
        assert_eq!(
            v,
            Block::new(vec![(t(2), Value::float(2.0)), (t(3), Value::float(4.0))]).unwrap()
        );
    });
}

#[test]
fn interning_spans_composed_constructors() {
    IdentityMap::scoped(|| {
        let x = floats(&[(1, 1.0), (2, 2.0)]);
        let y = floats(&[(1, 3.0), (3, 4.0)]);

        assert_eq!(floats(&[(1, 1.0), (2, 2.0)]), x);
        assert_eq!(mean(&x).unwrap(), mean(&x).unwrap());
        assert_eq!(&x + &y, &x + &y);
        assert_eq!(cov(&x, &y, true).unwrap(), cov(&x, &y, true).unwrap());

        // Repeated coalignment shares every intermediate node.
        let a = coalign(&[x.clone(), y.clone()], Alignment::Union).unwrap();
        let b = coalign(&[x.clone(), y.clone()], Alignment::Union).unwrap();
        assert_eq!(a, b);
    });
}

#[test]
fn constant_propagation_through_arithmetic() {
    IdentityMap::scoped(|| {
        let two = constant(Value::Int(2)).unwrap();
        let three = constant(Value::Int(3)).unwrap();
        assert_eq!(&two + &three, constant(Value::Int(5)).unwrap());
        assert_eq!(&two * &three, constant(Value::Int(6)).unwrap());
        assert_eq!(mean(&two).unwrap(), two);
        assert_eq!(sum(&two).unwrap(), two);
        assert!(var(&two, true).is_err());
    });
}

#[test]
fn correlation_of_anticorrelated_series() {
    IdentityMap::scoped(|| {
        let x = floats(&[(1, 1.0), (2, 2.0), (3, 3.0), (4, 4.0)]);
        let y = floats(&[(1, 4.0), (2, 3.0), (3, 2.0), (4, 1.0)]);
        let r = cor(&x, &y).unwrap();
        let out = evaluate(&r, t(1), t(10)).unwrap();
        let last = out.get(out.len() - 1).unwrap().1.as_f64().unwrap();
        assert!((last + 1.0).abs() < 1e-12);
    });
}

// ------------------------------------------------------------ properties

/// Strictly increasing day offsets paired with bounded finite values.
fn series(max_len: usize) -> impl Strategy<Value = Vec<(u32, f64)>> {
    proptest::collection::btree_set(1u32..60, 1..max_len).prop_flat_map(|days| {
        let days: Vec<u32> = days.into_iter().collect();
        let n = days.len();
        proptest::collection::vec(-100.0f64..100.0, n)
            .prop_map(move |vals| days.iter().copied().zip(vals).collect::<Vec<_>>())
    })
}

proptest! {
    #[test]
    fn union_sum_commutes(a in series(20), b in series(20)) {
        IdentityMap::scoped(|| {
            let (x, y) = (floats(&a), floats(&b));
            let xy = evaluate(&(&x + &y), t(1), t(61)).unwrap();
            let yx = evaluate(&(&y + &x), t(1), t(61)).unwrap();
            assert_eq!(xy, yx);
        });
    }

    #[test]
    fn intersect_times_are_a_subset_of_union_times(a in series(20), b in series(20)) {
        IdentityMap::scoped(|| {
            let (x, y) = (floats(&a), floats(&b));
            let union = knotwork::binary(&x, &y, BinaryFunc::Add, Alignment::Union).unwrap();
            let inter = knotwork::binary(&x, &y, BinaryFunc::Add, Alignment::Intersect).unwrap();
            let union_times = evaluate(&union, t(1), t(61)).unwrap();
            let inter_times = evaluate(&inter, t(1), t(61)).unwrap();
            for time in inter_times.times() {
                assert!(union_times.times().contains(time));
            }
        });
    }

    #[test]
    fn left_output_follows_the_left_schedule(a in series(20), b in series(20)) {
        IdentityMap::scoped(|| {
            let (x, y) = (floats(&a), floats(&b));
            let left = knotwork::binary(&x, &y, BinaryFunc::Add, Alignment::Left).unwrap();
            let out = evaluate(&left, t(1), t(61)).unwrap();

            let y_first = t(b[0].0);
            let expected: Vec<Timestamp> = a
                .iter()
                .map(|&(d, _)| t(d))
                .filter(|&time| time >= y_first)
                .collect();
            assert_eq!(out.times(), &expected[..]);
        });
    }

    #[test]
    fn emitted_blocks_are_strictly_ascending(a in series(20), b in series(20)) {
        IdentityMap::scoped(|| {
            let (x, y) = (floats(&a), floats(&b));
            let composite = mean(&(&x + &y)).unwrap();
            let out = evaluate(&composite, t(1), t(61)).unwrap();
            for pair in out.times().windows(2) {
                assert!(pair[0] < pair[1]);
            }
        });
    }

    #[test]
    fn fixed_window_waits_for_n_inputs(a in series(30), n in 2usize..6) {
        IdentityMap::scoped(|| {
            let x = floats(&a);
            let m = mean_window(&x, n, false).unwrap();
            let out = evaluate(&m, t(1), t(61)).unwrap();
            if a.len() < n {
                assert!(out.is_empty());
            } else {
                // The first emission is exactly at the n-th input tick.
                assert_eq!(out.first().map(|(time, _)| time), Some(t(a[n - 1].0)));
            }
        });
    }

    #[test]
    fn cumulative_variance_agrees_with_one_shot(a in series(30)) {
        prop_assume!(a.len() >= 2);
        IdentityMap::scoped(|| {
            let x = floats(&a);
            let v = evaluate(&var(&x, true).unwrap(), t(1), t(61)).unwrap();
            let last = v.get(v.len() - 1).unwrap().1.as_f64().unwrap();

            let n = a.len() as f64;
            let m = a.iter().map(|&(_, x)| x).sum::<f64>() / n;
            let expected = a.iter().map(|&(_, x)| (x - m).powi(2)).sum::<f64>() / (n - 1.0);
            assert!((last - expected).abs() < 1e-9 * expected.abs().max(1.0));
        });
    }

    #[test]
    fn cumulative_covariance_agrees_with_one_shot(a in series(30), b in series(30)) {
        IdentityMap::scoped(|| {
            let (x, y) = (floats(&a), floats(&b));
            let c = evaluate(&cov(&x, &y, false).unwrap(), t(1), t(61)).unwrap();
            if c.is_empty() {
                return;
            }
            let last = c.get(c.len() - 1).unwrap().1.as_f64().unwrap();

            // Reconstruct the aligned pair sequence the engine saw.
            let mut pairs: Vec<(f64, f64)> = Vec::new();
            let (mut xi, mut yi) = (None, None);
            let mut days: Vec<u32> = a.iter().chain(&b).map(|&(d, _)| d).collect();
            days.sort_unstable();
            days.dedup();
            for d in days {
                if let Some(&(_, v)) = a.iter().find(|&&(ad, _)| ad == d) {
                    xi = Some(v);
                }
                if let Some(&(_, v)) = b.iter().find(|&&(bd, _)| bd == d) {
                    yi = Some(v);
                }
                if let (Some(x), Some(y)) = (xi, yi) {
                    pairs.push((x, y));
                }
            }

            let n = pairs.len() as f64;
            let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
            let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;
            let expected = pairs.iter().map(|p| (p.0 - mx) * (p.1 - my)).sum::<f64>() / n;
            assert!((last - expected).abs() < 1e-9 * expected.abs().max(1.0));
        });
    }

    #[test]
    fn ema_is_exact_on_constant_streams(days in proptest::collection::btree_set(1u32..60, 2..20),
                                        c in -50.0f64..50.0,
                                        alpha in 0.01f64..0.99) {
        IdentityMap::scoped(|| {
            let knots: Vec<(u32, f64)> = days.into_iter().map(|d| (d, c)).collect();
            let x = floats(&knots);
            let e = evaluate(&knotwork::ema(&x, alpha).unwrap(), t(1), t(61)).unwrap();
            assert_eq!(e.len(), knots.len());
            for (_, v) in e.iter() {
                assert!((v.as_f64().unwrap() - c).abs() < 1e-9);
            }
        });
    }
}
