use alloc::vec::Vec;

use crate::{Def, ListDef, ListVTable, PtrConst, PtrMut, Reflect, Shape, ValueVTable};

unsafe fn vec_len<T>(list: PtrConst) -> usize {
    unsafe { list.get::<Vec<T>>().len() }
}

unsafe fn vec_as_ptr<T>(list: PtrConst) -> PtrConst {
    unsafe { PtrConst::new(list.get::<Vec<T>>().as_ptr()) }
}

unsafe fn vec_install<T>(list: PtrMut, elems: PtrMut, len: usize) {
    unsafe {
        let vec = list.as_mut::<Vec<T>>();
        vec.clear();
        vec.reserve_exact(len);
        core::ptr::copy_nonoverlapping(elems.as_mut_ptr::<T>(), vec.as_mut_ptr(), len);
        vec.set_len(len);
    }
}

unsafe impl<T: Reflect> Reflect for Vec<T> {
    const SHAPE: &'static Shape = &const {
        Shape::new::<Vec<T>>(
            "Vec",
            Def::List(ListDef::new(
                &const {
                    ListVTable {
                        len: vec_len::<T>,
                        as_ptr: vec_as_ptr::<T>,
                        install: vec_install::<T>,
                    }
                },
                T::SHAPE,
            )),
            &const { ValueVTable::of::<Vec<T>>() },
        )
    };
}
