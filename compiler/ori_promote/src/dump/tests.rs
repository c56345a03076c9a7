use pretty_assertions::assert_eq;

use crate::aggregate::Aggregates;
use crate::dense::DenseIndexMap;
use crate::ir::Function;
use crate::test_helpers::two_int_struct;

use super::*;

fn fixture() -> (Aggregates, DenseIndexMap) {
    let mut func = Function::new();
    let first = two_int_struct(&mut func);
    let second = two_int_struct(&mut func);
    let aggregates = Aggregates::new(vec![first, second]);
    let index_map = DenseIndexMap::build(&aggregates);
    (aggregates, index_map)
}

#[test]
fn renders_remainders_and_fields() {
    let (aggregates, index_map) = fixture();
    let mut set = index_map.empty_set();
    // V00 remainder, V00 field 1, V03 field 0.
    set.insert(0);
    set.insert(2);
    set.insert(4);

    assert_eq!(
        VarSetDisplay::new(&set, &aggregates, &index_map).to_string(),
        "{V00(remainder) V00.[008..012) V03.[000..004)}"
    );
}

#[test]
fn empty_set_renders_braces() {
    let (aggregates, index_map) = fixture();
    let set = index_map.empty_set();
    assert_eq!(
        VarSetDisplay::new(&set, &aggregates, &index_map).to_string(),
        "{}"
    );
}

#[test]
fn padding_keeps_columns_aligned() {
    let (aggregates, index_map) = fixture();
    let mut set = index_map.empty_set();
    let mut all = index_map.empty_set();
    set.insert(1);
    all.insert(0);
    all.insert(1);

    let rendered = VarSetDisplay::new(&set, &aggregates, &index_map)
        .padded(&all)
        .to_string();
    assert_eq!(rendered, format!("{{{} V00.[000..004)}}", " ".repeat(14)));
}
