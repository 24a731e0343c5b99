use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use indexmap::IndexMap;

use super::{Annotation, Describe, TypeRegistry};

macro_rules! describe_as {
    ($ann:expr => $($ty:ty),+ $(,)?) => {
        $(
            impl Describe for $ty {
                fn describe(_: &mut TypeRegistry) -> Annotation { $ann }
            }
        )+
    };
}

describe_as!(Annotation::String => String, str, char);
describe_as!(Annotation::Boolean => bool);
describe_as!(Annotation::Number => f32, f64);
describe_as!(Annotation::Integer => i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);
describe_as!(Annotation::Any => serde_json::Value);
describe_as!(Annotation::Null => ());

impl<T: Describe + ?Sized> Describe for &T {
    fn describe(registry: &mut TypeRegistry) -> Annotation {
        T::describe(registry)
    }
}

impl<T: Describe + ?Sized> Describe for Box<T> {
    fn describe(registry: &mut TypeRegistry) -> Annotation {
        T::describe(registry)
    }
}

impl<T: Describe> Describe for Option<T> {
    fn describe(registry: &mut TypeRegistry) -> Annotation {
        Annotation::nullable(T::describe(registry))
    }
}

macro_rules! describe_seq {
    ($($seq:ident),+) => {
        $(
            impl<T: Describe> Describe for $seq<T> {
                fn describe(registry: &mut TypeRegistry) -> Annotation {
                    Annotation::list(T::describe(registry))
                }
            }
        )+
    };
}

describe_seq!(Vec, VecDeque, BTreeSet);

impl<T: Describe, S> Describe for HashSet<T, S> {
    fn describe(registry: &mut TypeRegistry) -> Annotation {
        Annotation::list(T::describe(registry))
    }
}

impl<T: Describe> Describe for [T] {
    fn describe(registry: &mut TypeRegistry) -> Annotation {
        Annotation::list(T::describe(registry))
    }
}

impl<K: Describe, V: Describe> Describe for BTreeMap<K, V> {
    fn describe(registry: &mut TypeRegistry) -> Annotation {
        let key = K::describe(registry);
        Annotation::map(key, V::describe(registry))
    }
}

impl<K: Describe, V: Describe, S> Describe for HashMap<K, V, S> {
    fn describe(registry: &mut TypeRegistry) -> Annotation {
        let key = K::describe(registry);
        Annotation::map(key, V::describe(registry))
    }
}

impl<K: Describe, V: Describe, S> Describe for IndexMap<K, V, S> {
    fn describe(registry: &mut TypeRegistry) -> Annotation {
        let key = K::describe(registry);
        Annotation::map(key, V::describe(registry))
    }
}

macro_rules! describe_tuple {
    ($($name:ident),+) => {
        impl<$($name: Describe),+> Describe for ($($name,)+) {
            fn describe(registry: &mut TypeRegistry) -> Annotation {
                Annotation::Tuple(vec![$($name::describe(registry)),+])
            }
        }
    };
}

describe_tuple!(A);
describe_tuple!(A, B);
describe_tuple!(A, B, C);
describe_tuple!(A, B, C, D);
