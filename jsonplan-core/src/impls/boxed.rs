use alloc::boxed::Box;

use crate::{Def, PointerDef, PointerVTable, PtrConst, PtrMut, Reflect, Shape, ValueVTable};

unsafe fn box_borrow<T>(pointer: PtrConst) -> PtrConst {
    unsafe { PtrConst::from_ref::<T>(pointer.get::<Box<T>>()) }
}

unsafe fn box_borrow_mut<T>(pointer: PtrMut) -> PtrMut {
    unsafe { PtrMut::from_mut::<T>(pointer.as_mut::<Box<T>>()) }
}

unsafe impl<T: Reflect> Reflect for Box<T> {
    const SHAPE: &'static Shape = &const {
        Shape::new::<Box<T>>(
            "Box",
            Def::Pointer(PointerDef::new(
                &const {
                    PointerVTable {
                        borrow: box_borrow::<T>,
                        borrow_mut: box_borrow_mut::<T>,
                    }
                },
                T::SHAPE,
            )),
            &const { ValueVTable::of::<Box<T>>() },
        )
    };
}
