use std::sync::Barrier;
use std::thread;

use jsonplan::{Reflect, from_str, schema_of, to_string};
use jsonplan_testhelpers::test;

#[derive(Debug, Default, PartialEq, Clone, Reflect)]
struct Line {
    sku: String,
    qty: u32,
    note: Option<String>,
}

#[derive(Debug, Default, PartialEq, Clone, Reflect)]
struct Basket {
    owner: String,
    lines: Vec<Line>,
    coupon: Option<Box<String>>,
}

fn basket(seed: u32) -> Basket {
    Basket {
        owner: format!("owner-{seed}"),
        lines: (0..seed % 7)
            .map(|i| Line {
                sku: format!("sku-{seed}-{i}"),
                qty: i,
                note: (i % 2 == 0).then(|| format!("n{i}")),
            })
            .collect(),
        coupon: (seed % 3 == 0).then(|| Box::new(format!("c{seed}"))),
    }
}

#[test]
fn parallel_calls_agree_with_serial_ones() {
    const THREADS: usize = 8;
    const ROUNDS: u32 = 200;

    let barrier = Barrier::new(THREADS);
    thread::scope(|s| {
        for t in 0..THREADS {
            let barrier = &barrier;
            s.spawn(move || {
                barrier.wait();
                for round in 0..ROUNDS {
                    let value = basket(round * THREADS as u32 + t as u32);
                    let json = to_string(&value).unwrap();
                    let back: Basket = from_str(&json).unwrap();
                    assert_eq!(back, value);
                }
            });
        }
    });
}

#[test]
fn racing_first_use_publishes_one_schema() {
    #[derive(Debug, Default, Reflect)]
    struct Fresh {
        a: u8,
        b: Vec<Option<u16>>,
    }

    const THREADS: usize = 8;
    let barrier = Barrier::new(THREADS);
    let schemas: Vec<usize> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let barrier = &barrier;
                s.spawn(move || {
                    barrier.wait();
                    schema_of::<Fresh>().unwrap() as *const _ as usize
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert!(schemas.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(schemas[0], schema_of::<Fresh>().unwrap() as *const _ as usize);
}

#[test]
fn errors_on_other_threads_do_not_poison_the_pool() {
    thread::scope(|s| {
        for t in 0..4 {
            s.spawn(move || {
                for i in 0..50 {
                    if (i + t) % 2 == 0 {
                        assert!(from_str::<Basket>(r#"{"lines":[{"qty":"x"}]}"#).is_err());
                    } else {
                        let b: Basket = from_str(r#"{"lines":[{"sku":"a","note":"n"}]}"#).unwrap();
                        assert_eq!(b.lines[0].note.as_deref(), Some("n"));
                    }
                }
            });
        }
    });
}
