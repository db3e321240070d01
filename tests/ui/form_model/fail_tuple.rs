#![allow(dead_code)]

#[derive(formtree::form::FormModel)]
struct Pair(String, i64);

fn main() {}
