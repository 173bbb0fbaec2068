mod boxed;
mod map;
mod option;
mod scalar;
mod vec;
