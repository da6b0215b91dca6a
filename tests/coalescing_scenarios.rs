//! Integration-level coverage of the named scenarios in spec.md's
//! "Concrete scenarios" section, built directly against the crate's
//! public `Function` constructors rather than a text format (see
//! SPEC_FULL.md §2.5 and DESIGN.md).

use copyopt::ir::{ColorSet, Constraint, Def};
use copyopt::regalloc::context::{driver, verify_coloring};
use copyopt::regalloc::liveness::Liveness;
use copyopt::{Function, Options, RegClass};

fn gpr(f: &mut Function, n_regs: u16) {
    f.classes.push(RegClass::new("GPR", n_regs));
}

#[test]
fn two_address_add_coalesces_root_and_operand() {
    let mut f = Function::new();
    gpr(&mut f, 4);
    let entry = f.make_block();
    f.blocks[entry].frequency = 5;
    let a = f.make_value(
        Def::Normal {
            block: entry,
            args: vec![],
        },
        0,
        Constraint::normal(),
    );
    let r = f.make_value(
        Def::Normal {
            block: entry,
            args: vec![a],
        },
        0,
        Constraint::should_be_same(0),
    );
    f.recompute_uses();
    f.set_color(a, 1);
    f.set_color(r, 2);

    let reports = driver(&mut f, &Options::default()).unwrap();
    assert_eq!(f.color(a), f.color(r));
    assert!(reports[0].after.copy_costs < reports[0].before.copy_costs);
}

#[test]
fn phi_with_self_argument_drops_the_back_edge_operand() {
    let mut f = Function::new();
    gpr(&mut f, 4);
    let entry = f.make_block();
    let header = f.make_block();
    f.add_edge(entry, header);
    f.add_edge(header, header);
    let a = f.make_value(
        Def::Normal {
            block: entry,
            args: vec![],
        },
        0,
        Constraint::normal(),
    );
    let phi = f.make_value(
        Def::Phi {
            block: header,
            args: vec![a, a],
        },
        0,
        Constraint::normal(),
    );
    // Back-edge operand is the phi itself.
    f.values[phi].def = Def::Phi {
        block: header,
        args: vec![a, phi],
    };
    f.recompute_uses();
    f.set_color(a, 0);
    f.set_color(phi, 1);

    driver(&mut f, &Options::default()).unwrap();
    assert_eq!(f.color(phi), f.color(a));
}

#[test]
fn phi_with_interfering_argument_never_shares_its_color() {
    let mut f = Function::new();
    gpr(&mut f, 4);
    let entry = f.make_block();
    let header = f.make_block();
    f.add_edge(entry, header);
    f.add_edge(header, header);
    let a = f.make_value(
        Def::Normal {
            block: entry,
            args: vec![],
        },
        0,
        Constraint::normal(),
    );
    let b = f.make_value(
        Def::Normal {
            block: entry,
            args: vec![],
        },
        0,
        Constraint::normal(),
    );
    let phi = f.make_value(
        Def::Phi {
            block: header,
            args: vec![a, b],
        },
        0,
        Constraint::normal(),
    );
    // `b` is kept alive across the header by a later use alongside the
    // phi, so `b` and `phi` interfere and can never coalesce.
    let _user = f.make_value(
        Def::Normal {
            block: header,
            args: vec![b, phi],
        },
        0,
        Constraint::normal(),
    );
    f.recompute_uses();
    f.set_color(a, 0);
    f.set_color(b, 1);
    f.set_color(phi, 2);

    driver(&mut f, &Options::default()).unwrap();
    assert_ne!(f.color(phi), f.color(b));
}

#[test]
fn constrained_colliding_outputs_keep_their_colors() {
    let mut f = Function::new();
    gpr(&mut f, 4);
    let entry = f.make_block();
    let mut eax = ColorSet::empty();
    eax.insert(0);
    let mut edx = ColorSet::empty();
    edx.insert(1);
    let a = f.make_value(
        Def::Normal {
            block: entry,
            args: vec![],
        },
        0,
        Constraint::limited(edx),
    );
    let r = f.make_value(
        Def::Normal {
            block: entry,
            args: vec![a],
        },
        0,
        Constraint {
            limited: Some(eax),
            ..Constraint::should_be_same(0)
        },
    );
    f.recompute_uses();
    f.set_color(a, 1);
    f.set_color(r, 0);

    driver(&mut f, &Options::default()).unwrap();
    assert_eq!(f.color(a), Some(1));
    assert_eq!(f.color(r), Some(0));
}

#[test]
fn pinned_global_conflict_keeps_second_unit_off_the_first_units_color() {
    // Two independent two-address pairs in the same block, sharing a
    // tight 2-register class: whichever unit the solver commits first
    // pins its members' colors globally, and the second unit must
    // either pick a free color or leave its members uncoalesced rather
    // than clash with the first.
    let mut f = Function::new();
    gpr(&mut f, 2);
    let entry = f.make_block();
    f.blocks[entry].frequency = 10;

    let a1 = f.make_value(
        Def::Normal {
            block: entry,
            args: vec![],
        },
        0,
        Constraint::normal(),
    );
    let r1 = f.make_value(
        Def::Normal {
            block: entry,
            args: vec![a1],
        },
        0,
        Constraint::should_be_same(0),
    );
    let a2 = f.make_value(
        Def::Normal {
            block: entry,
            args: vec![],
        },
        0,
        Constraint::normal(),
    );
    let r2 = f.make_value(
        Def::Normal {
            block: entry,
            args: vec![a2],
        },
        0,
        Constraint::should_be_same(0),
    );
    // Whether or not these two pairs actually interfere isn't the point
    // of this test: with only 2 registers in the class, both pairs
    // competing for color 0 exercises the pinned-global path in
    // `solve_unit`, and the only thing asserted is that the result is
    // still a legal coloring.
    f.recompute_uses();
    f.set_color(a1, 0);
    f.set_color(r1, 1);
    f.set_color(a2, 0);
    f.set_color(r2, 1);

    let mut live = Liveness::new();
    live.compute(&f, entry);
    driver(&mut f, &Options::default()).unwrap();

    // Whatever the solver decided, the result must still be a legal
    // coloring: no two values the liveness analysis reports as
    // interfering end up sharing a color.
    assert!(verify_coloring(&f, 0, &live).is_ok());
}
