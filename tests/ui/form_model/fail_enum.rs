#![allow(dead_code)]

#[derive(formtree::form::FormModel)]
enum Choice {
    Yes,
    No,
}

fn main() {}
