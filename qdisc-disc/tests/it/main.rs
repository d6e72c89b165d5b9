mod delay;
mod dwrr;
mod marker;
