use crate::{Def, OptionDef, OptionVTable, PtrConst, PtrMut, Reflect, Shape, ValueVTable};

unsafe fn option_is_some<T>(option: PtrConst) -> bool {
    unsafe { option.get::<Option<T>>().is_some() }
}

unsafe fn option_get<T>(option: PtrConst) -> Option<PtrConst> {
    unsafe { option.get::<Option<T>>().as_ref().map(PtrConst::from_ref) }
}

unsafe fn option_get_mut<T>(option: PtrMut) -> Option<PtrMut> {
    unsafe { option.as_mut::<Option<T>>().as_mut().map(PtrMut::from_mut) }
}

unsafe fn option_set_none<T>(option: PtrMut) {
    unsafe { *option.as_mut::<Option<T>>() = None }
}

unsafe fn option_put_some<T>(option: PtrMut, value: PtrMut) {
    unsafe { *option.as_mut::<Option<T>>() = Some(value.read::<T>()) }
}

unsafe fn option_vivify<T: Default>(option: PtrMut) -> PtrMut {
    unsafe { PtrMut::from_mut(option.as_mut::<Option<T>>().get_or_insert_with(T::default)) }
}

unsafe impl<T: Reflect> Reflect for Option<T> {
    const SHAPE: &'static Shape = &const {
        Shape::new::<Option<T>>(
            "Option",
            Def::Option(OptionDef::new(
                &const {
                    OptionVTable {
                        is_some: option_is_some::<T>,
                        get: option_get::<T>,
                        get_mut: option_get_mut::<T>,
                        set_none: option_set_none::<T>,
                        put_some: option_put_some::<T>,
                        vivify: option_vivify::<T>,
                    }
                },
                T::SHAPE,
            )),
            &const { ValueVTable::of::<Option<T>>() },
        )
    };
}
