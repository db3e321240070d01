#![allow(dead_code)]

#[derive(formtree::form::FormModel)]
struct Wrapper<T> {
    value: T,
}

fn main() {}
