use alloc::collections::BTreeMap;
use core::hash::{BuildHasher, Hash};
use std::collections::HashMap;

use indexmap::IndexMap;

use crate::{Def, MapDef, MapVTable, PtrConst, PtrMut, Reflect, Shape, ValueVTable};

unsafe fn hashmap_len<K, V, S>(map: PtrConst) -> usize {
    unsafe { map.get::<HashMap<K, V, S>>().len() }
}

unsafe fn hashmap_reserve<K: Eq + Hash, V, S: BuildHasher>(map: PtrMut, additional: usize) {
    unsafe { map.as_mut::<HashMap<K, V, S>>().reserve(additional) }
}

unsafe fn hashmap_insert<K: Eq + Hash, V, S: BuildHasher>(map: PtrMut, key: PtrMut, value: PtrMut) {
    unsafe {
        map.as_mut::<HashMap<K, V, S>>()
            .insert(key.read::<K>(), value.read::<V>());
    }
}

unsafe fn hashmap_for_each<K, V, S>(map: PtrConst, f: &mut dyn FnMut(PtrConst, PtrConst)) {
    for (k, v) in unsafe { map.get::<HashMap<K, V, S>>() } {
        f(PtrConst::from_ref(k), PtrConst::from_ref(v));
    }
}

unsafe impl<K, V, S> Reflect for HashMap<K, V, S>
where
    K: Reflect + Eq + Hash,
    V: Reflect,
    S: BuildHasher + Default + 'static,
{
    const SHAPE: &'static Shape = &const {
        Shape::new::<HashMap<K, V, S>>(
            "HashMap",
            Def::Map(MapDef::new(
                &const {
                    MapVTable {
                        len: hashmap_len::<K, V, S>,
                        reserve: hashmap_reserve::<K, V, S>,
                        insert: hashmap_insert::<K, V, S>,
                        for_each: hashmap_for_each::<K, V, S>,
                    }
                },
                K::SHAPE,
                V::SHAPE,
            )),
            &const { ValueVTable::of::<HashMap<K, V, S>>() },
        )
    };
}

unsafe fn indexmap_len<K, V, S>(map: PtrConst) -> usize {
    unsafe { map.get::<IndexMap<K, V, S>>().len() }
}

unsafe fn indexmap_reserve<K: Eq + Hash, V, S: BuildHasher>(map: PtrMut, additional: usize) {
    unsafe { map.as_mut::<IndexMap<K, V, S>>().reserve(additional) }
}

unsafe fn indexmap_insert<K: Eq + Hash, V, S: BuildHasher>(
    map: PtrMut,
    key: PtrMut,
    value: PtrMut,
) {
    unsafe {
        map.as_mut::<IndexMap<K, V, S>>()
            .insert(key.read::<K>(), value.read::<V>());
    }
}

unsafe fn indexmap_for_each<K, V, S>(map: PtrConst, f: &mut dyn FnMut(PtrConst, PtrConst)) {
    for (k, v) in unsafe { map.get::<IndexMap<K, V, S>>() } {
        f(PtrConst::from_ref(k), PtrConst::from_ref(v));
    }
}

unsafe impl<K, V, S> Reflect for IndexMap<K, V, S>
where
    K: Reflect + Eq + Hash,
    V: Reflect,
    S: BuildHasher + Default + 'static,
{
    const SHAPE: &'static Shape = &const {
        Shape::new::<IndexMap<K, V, S>>(
            "IndexMap",
            Def::Map(MapDef::new(
                &const {
                    MapVTable {
                        len: indexmap_len::<K, V, S>,
                        reserve: indexmap_reserve::<K, V, S>,
                        insert: indexmap_insert::<K, V, S>,
                        for_each: indexmap_for_each::<K, V, S>,
                    }
                },
                K::SHAPE,
                V::SHAPE,
            )),
            &const { ValueVTable::of::<IndexMap<K, V, S>>() },
        )
    };
}

unsafe fn btreemap_len<K, V>(map: PtrConst) -> usize {
    unsafe { map.get::<BTreeMap<K, V>>().len() }
}

// BTreeMap has no capacity to reserve.
unsafe fn btreemap_reserve(_map: PtrMut, _additional: usize) {}

unsafe fn btreemap_insert<K: Ord, V>(map: PtrMut, key: PtrMut, value: PtrMut) {
    unsafe {
        map.as_mut::<BTreeMap<K, V>>()
            .insert(key.read::<K>(), value.read::<V>());
    }
}

unsafe fn btreemap_for_each<K, V>(map: PtrConst, f: &mut dyn FnMut(PtrConst, PtrConst)) {
    for (k, v) in unsafe { map.get::<BTreeMap<K, V>>() } {
        f(PtrConst::from_ref(k), PtrConst::from_ref(v));
    }
}

unsafe impl<K, V> Reflect for BTreeMap<K, V>
where
    K: Reflect + Ord,
    V: Reflect,
{
    const SHAPE: &'static Shape = &const {
        Shape::new::<BTreeMap<K, V>>(
            "BTreeMap",
            Def::Map(MapDef::new(
                &const {
                    MapVTable {
                        len: btreemap_len::<K, V>,
                        reserve: btreemap_reserve,
                        insert: btreemap_insert::<K, V>,
                        for_each: btreemap_for_each::<K, V>,
                    }
                },
                K::SHAPE,
                V::SHAPE,
            )),
            &const { ValueVTable::of::<BTreeMap<K, V>>() },
        )
    };
}
