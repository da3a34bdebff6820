use halite::{Solver, SolverResult};

use halite_formula::{cnf_formula, lits, Lit, Var};

#[test]
fn tiny_sat() {
    let mut solver = Solver::new();
    solver
        .add_formula(&cnf_formula![
            1, 2;
            -1, 3;
            -2, -3;
        ])
        .unwrap();

    assert_eq!(solver.solve(&[]), SolverResult::Sat);

    let model = solver.model().unwrap();
    assert!(model[0] || model[1]);
    assert!(!model[0] || model[2]);
    assert!(!model[1] || !model[2]);
}

#[test]
fn tiny_unsat() {
    let mut solver = Solver::new();
    solver
        .add_formula(&cnf_formula![
            1;
            2;
            -1, -2;
        ])
        .unwrap();

    assert_eq!(solver.solve(&[]), SolverResult::Unsat);
}

#[test]
fn pigeon_hole_3_into_2_unsat() {
    let mut solver = Solver::new();

    // One variable per pigeon and hole pair.
    let place = |pigeon: usize, hole: usize| Lit::from_index(pigeon * 2 + hole, true);

    for _ in 0..6 {
        solver.new_var();
    }

    for pigeon in 0..3 {
        solver.add_clause(&[place(pigeon, 0), place(pigeon, 1)]).unwrap();
    }

    for hole in 0..2 {
        for pigeon_a in 0..3 {
            for pigeon_b in 0..pigeon_a {
                solver
                    .add_clause(&[!place(pigeon_a, hole), !place(pigeon_b, hole)])
                    .unwrap();
            }
        }
    }

    assert_eq!(solver.solve(&[]), SolverResult::Unsat);
}

#[test]
fn propagation_chain_is_fixed_at_the_top_level() {
    let mut solver = Solver::new();
    solver
        .add_formula(&cnf_formula![
            1;
            -1, 2;
            -2, 3;
            -3, 4;
            -4, 5;
        ])
        .unwrap();

    assert_eq!(solver.solve(&[]), SolverResult::Sat);
    assert_eq!(solver.model().unwrap(), vec![true; 5]);
    assert_eq!(solver.root_level_units().len(), 5);
    assert_eq!(solver.stats().decisions, 0);
}

#[test]
fn assumptions_unsat_with_failed_core() {
    let mut solver = Solver::new();
    solver.add_formula(&cnf_formula![1, 2;]).unwrap();

    assert_eq!(solver.solve(&lits![-1, -2]), SolverResult::Unsat);

    let mut failed = solver.failed_assumptions().to_vec();
    failed.sort();
    assert_eq!(failed, lits![-1, -2]);

    assert_eq!(solver.solve(&[]), SolverResult::Sat);
}

#[test]
fn xor_clause_accepts_exactly_the_odd_parity_models() {
    for assignment in 0..8u32 {
        let mut solver = Solver::new();
        for _ in 0..3 {
            solver.new_var();
        }

        solver.add_xor_clause(&lits![1, 2, 3], true).unwrap();

        let assumptions: Vec<Lit> = (0..3)
            .map(|index| Lit::from_index(index, assignment & (1 << index) != 0))
            .collect();

        let expected = if assignment.count_ones() & 1 == 1 {
            SolverResult::Sat
        } else {
            SolverResult::Unsat
        };

        assert_eq!(solver.solve(&assumptions), expected);
    }
}

#[test]
fn incremental_clause_addition() {
    let mut solver = Solver::new();
    for _ in 0..3 {
        solver.new_var();
    }

    solver.add_clause(&lits![1, 2, 3]).unwrap();
    assert_eq!(solver.solve(&[]), SolverResult::Sat);

    solver.add_clause(&lits![-1]).unwrap();
    solver.add_clause(&lits![-2]).unwrap();
    assert_eq!(solver.solve(&[]), SolverResult::Sat);

    let model = solver.model().unwrap();
    assert!(!model[0] && !model[1] && model[2]);

    solver.add_clause(&lits![-3]).unwrap();
    assert_eq!(solver.solve(&[]), SolverResult::Unsat);
}

#[test]
fn new_learnt_binary_clauses_are_reported() {
    use std::cell::RefCell;
    use std::rc::Rc;

    let shared: Rc<RefCell<Vec<(Lit, Lit)>>> = Rc::new(RefCell::new(vec![]));
    let sink = shared.clone();

    let mut solver = Solver::new();
    solver.on_new_learnt_binary(move |a, b| sink.borrow_mut().push((a, b)));

    // An unsatisfiable formula that forces some learning before the empty clause is derived.
    let mut formula = cnf_formula![
        1, 2, 3;
        1, 2, -3;
        1, -2, 3;
        1, -2, -3;
        -1, 2, 3;
        -1, 2, -3;
        -1, -2, 3;
        -1, -2, -3;
    ];
    formula.set_var_count(3);

    solver.add_formula(&formula).unwrap();
    assert_eq!(solver.solve(&[]), SolverResult::Unsat);

    for &(a, b) in shared.borrow().iter() {
        assert_ne!(a.var(), b.var());
        assert!(a.index() < 3 && b.index() < 3);
    }
}

#[test]
fn variables_can_be_added_on_the_fly() {
    let mut solver = Solver::new();

    let x = solver.new_var();
    let y = solver.new_var();
    assert_eq!((x, y), (Var::from_index(0), Var::from_index(1)));

    solver.add_clause(&[x.positive(), y.positive()]).unwrap();

    let z = solver.new_var();
    solver.add_clause(&[z.negative()]).unwrap();

    assert_eq!(solver.solve(&[]), SolverResult::Sat);
    let model = solver.model().unwrap();
    assert!(model[x.index()] || model[y.index()]);
    assert!(!model[z.index()]);
}
